//! SQLite schema definitions for historical match data
//!
//! Tables:
//! - matches: Fixture information with season and home/away teams
//! - players: Player names
//! - team_lists: Named players per team for a match
//! - player_match_stats: One row per player appearance with tries scored
//! - team_try_distributions: Team try-count distribution for a match
//! - outcome_bins: Precomputed outcome buckets by margin and total points

use rusqlite::{Connection, Result};

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY,
            season_id INTEGER NOT NULL,
            round INTEGER,
            home_team_id INTEGER NOT NULL,
            away_team_id INTEGER NOT NULL,
            kickoff TEXT
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS players (
            player_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS team_lists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id INTEGER NOT NULL REFERENCES matches(match_id),
            team_id INTEGER NOT NULL,
            player_id INTEGER NOT NULL,
            position TEXT NOT NULL,
            jersey_number INTEGER,
            is_replacement INTEGER NOT NULL DEFAULT 0,
            UNIQUE(match_id, player_id)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS player_match_stats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id INTEGER NOT NULL REFERENCES matches(match_id),
            player_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            position TEXT NOT NULL,
            tries INTEGER NOT NULL DEFAULT 0,
            UNIQUE(match_id, player_id)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS team_try_distributions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id INTEGER NOT NULL REFERENCES matches(match_id),
            team_id INTEGER NOT NULL,
            tries INTEGER NOT NULL,
            probability REAL NOT NULL,
            UNIQUE(match_id, team_id, tries)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS outcome_bins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id INTEGER NOT NULL REFERENCES matches(match_id),
            margin INTEGER NOT NULL,
            total_points INTEGER NOT NULL,
            home_try_dist TEXT NOT NULL,
            away_try_dist TEXT NOT NULL,
            count INTEGER NOT NULL,
            UNIQUE(match_id, margin, total_points)
        )
        "#,
        [],
    )?;

    create_indexes(conn)?;

    Ok(())
}

/// Create indexes for common queries
fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(season_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_team_lists_match_team ON team_lists(match_id, team_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_stats_player ON player_match_stats(player_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_bins_match ON outcome_bins(match_id)",
        [],
    )?;
    Ok(())
}
