//! SQLite repository for historical match data

use anyhow::{Context, Result};
use chrono::DateTime;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::schema::create_tables;
use crate::distribution::TryCountDistribution;
use crate::outcome_bins::OutcomeBin;
use crate::try_rate::{PlayerHistory, PositionGroup};

/// Fixture information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub match_id: i64,
    pub season_id: i32,
    #[serde(default)]
    pub round: Option<i32>,
    pub home_team_id: i64,
    pub away_team_id: i64,
    #[serde(default)]
    pub kickoff: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub player_id: i64,
    pub name: String,
}

/// A named player for one team in one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamListEntry {
    pub match_id: i64,
    pub team_id: i64,
    pub player_id: i64,
    pub position: String,
    #[serde(default)]
    pub jersey_number: Option<i32>,
    #[serde(default)]
    pub is_replacement: bool,
}

/// A player's appearance in a completed match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAppearance {
    pub match_id: i64,
    pub player_id: i64,
    pub team_id: i64,
    pub position: String,
    pub tries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamTryDistribution {
    pub match_id: i64,
    pub team_id: i64,
    pub distribution: TryCountDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcomeBin {
    pub match_id: i64,
    pub margin: i32,
    pub total_points: i32,
    pub home_try_dist: TryCountDistribution,
    pub away_try_dist: TryCountDistribution,
    pub count: u64,
}

impl MatchOutcomeBin {
    fn to_bin(&self) -> OutcomeBin {
        OutcomeBin {
            margin: self.margin,
            total_points: self.total_points,
            home_try_dist: self.home_try_dist.clone(),
            away_try_dist: self.away_try_dist.clone(),
            count: self.count,
        }
    }
}

/// Bulk import payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub matches: Vec<MatchInfo>,
    #[serde(default)]
    pub players: Vec<PlayerInfo>,
    #[serde(default)]
    pub team_lists: Vec<TeamListEntry>,
    #[serde(default)]
    pub appearances: Vec<PlayerAppearance>,
    #[serde(default)]
    pub try_distributions: Vec<TeamTryDistribution>,
    #[serde(default)]
    pub outcome_bins: Vec<MatchOutcomeBin>,
}

/// Row counts written by an import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub matches: usize,
    pub players: usize,
    pub team_lists: usize,
    pub appearances: usize,
    pub try_distributions: usize,
    pub outcome_bins: usize,
}

/// Whether `candidate` was played before `target`.
///
/// Seasons order first. Inside a season, kickoff times decide when both are
/// known RFC 3339 timestamps, then round numbers. A same-season match with
/// neither known on both sides counts as earlier.
pub fn played_before(candidate: &MatchInfo, target: &MatchInfo) -> bool {
    if candidate.match_id == target.match_id {
        return false;
    }
    if candidate.season_id != target.season_id {
        return candidate.season_id < target.season_id;
    }

    let kickoff = |m: &MatchInfo| {
        m.kickoff
            .as_deref()
            .and_then(|k| DateTime::parse_from_rfc3339(k).ok())
    };
    if let (Some(a), Some(b)) = (kickoff(candidate), kickoff(target)) {
        return a < b;
    }

    match (candidate.round, target.round) {
        (Some(a), Some(b)) => a < b,
        _ => true,
    }
}

/// Repository for historical match data
pub struct MatchRepository {
    conn: Connection,
}

impl MatchRepository {
    /// Create a new repository, initializing the database if needed
    pub fn new(db_path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        create_tables(&conn)?;

        Ok(Self { conn })
    }

    /// Create an in-memory repository (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    // ==================== Insert Operations ====================

    /// Insert a match (upsert)
    pub fn insert_match(&self, info: &MatchInfo) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO matches
            (match_id, season_id, round, home_team_id, away_team_id, kickoff)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                info.match_id,
                info.season_id,
                info.round,
                info.home_team_id,
                info.away_team_id,
                info.kickoff,
            ],
        )?;
        Ok(())
    }

    pub fn insert_player(&self, player: &PlayerInfo) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO players (player_id, name) VALUES (?1, ?2)",
            params![player.player_id, player.name],
        )?;
        Ok(())
    }

    /// Insert a team list entry (upsert)
    pub fn insert_team_list_entry(&self, entry: &TeamListEntry) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO team_lists
            (match_id, team_id, player_id, position, jersey_number, is_replacement)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.match_id,
                entry.team_id,
                entry.player_id,
                entry.position,
                entry.jersey_number,
                entry.is_replacement,
            ],
        )?;
        Ok(())
    }

    /// Insert a player appearance (upsert)
    pub fn insert_appearance(&self, appearance: &PlayerAppearance) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO player_match_stats
            (match_id, player_id, team_id, position, tries)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                appearance.match_id,
                appearance.player_id,
                appearance.team_id,
                appearance.position,
                appearance.tries,
            ],
        )?;
        Ok(())
    }

    /// Replace the stored try distribution of a team for a match
    pub fn insert_try_distribution(
        &self,
        match_id: i64,
        team_id: i64,
        dist: &TryCountDistribution,
    ) -> Result<()> {
        self.conn.execute(
            "DELETE FROM team_try_distributions WHERE match_id = ?1 AND team_id = ?2",
            params![match_id, team_id],
        )?;
        for (tries, probability) in dist.iter() {
            self.conn.execute(
                r#"
                INSERT INTO team_try_distributions (match_id, team_id, tries, probability)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![match_id, team_id, tries, probability],
            )?;
        }
        Ok(())
    }

    /// Insert an outcome bin (upsert on margin and total points)
    pub fn insert_outcome_bin(&self, match_id: i64, bin: &OutcomeBin) -> Result<()> {
        let home = serde_json::to_string(&bin.home_try_dist)?;
        let away = serde_json::to_string(&bin.away_try_dist)?;
        let count = i64::try_from(bin.count).context("Outcome bin count does not fit in SQLite")?;
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO outcome_bins
            (match_id, margin, total_points, home_try_dist, away_try_dist, count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                match_id,
                bin.margin,
                bin.total_points,
                home,
                away,
                count
            ],
        )?;
        Ok(())
    }

    /// Import a dataset in a single transaction
    pub fn import_dataset(&self, dataset: &Dataset) -> Result<ImportSummary> {
        let tx = self.conn.unchecked_transaction()?;

        for m in &dataset.matches {
            self.insert_match(m)?;
        }
        for p in &dataset.players {
            self.insert_player(p)?;
        }
        for entry in &dataset.team_lists {
            self.insert_team_list_entry(entry)?;
        }
        for appearance in &dataset.appearances {
            self.insert_appearance(appearance)?;
        }
        for d in &dataset.try_distributions {
            self.insert_try_distribution(d.match_id, d.team_id, &d.distribution)?;
        }
        for bin in &dataset.outcome_bins {
            self.insert_outcome_bin(bin.match_id, &bin.to_bin())?;
        }

        tx.commit().context("Failed to commit import")?;

        Ok(ImportSummary {
            matches: dataset.matches.len(),
            players: dataset.players.len(),
            team_lists: dataset.team_lists.len(),
            appearances: dataset.appearances.len(),
            try_distributions: dataset.try_distributions.len(),
            outcome_bins: dataset.outcome_bins.len(),
        })
    }

    // ==================== Query Operations ====================

    pub fn get_match(&self, match_id: i64) -> Result<Option<MatchInfo>> {
        let info = self
            .conn
            .query_row(
                r#"
                SELECT match_id, season_id, round, home_team_id, away_team_id, kickoff
                FROM matches
                WHERE match_id = ?1
                "#,
                [match_id],
                |row| {
                    Ok(MatchInfo {
                        match_id: row.get(0)?,
                        season_id: row.get(1)?,
                        round: row.get(2)?,
                        home_team_id: row.get(3)?,
                        away_team_id: row.get(4)?,
                        kickoff: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }

    /// Try history of a team's named, non-replacement players for a match.
    ///
    /// Appearances are limited to matches in `seasons` (all seasons when
    /// empty) that were played before the target match, and are optionally
    /// restricted to a position group (labels are compared through the alias
    /// table, so "FB" and "Fullback" select the same appearances). Players
    /// are ordered by jersey number. An unknown match has no named players.
    pub fn get_team_player_histories(
        &self,
        match_id: i64,
        team_id: i64,
        seasons: &[i32],
        position: Option<&str>,
    ) -> Result<Vec<PlayerHistory>> {
        let Some(target) = self.get_match(match_id)? else {
            return Ok(Vec::new());
        };
        let wanted_group = position.map(PositionGroup::from_label);

        let mut stmt = self.conn.prepare(
            r#"
            SELECT player_id, position
            FROM team_lists
            WHERE match_id = ?1 AND team_id = ?2 AND is_replacement = 0
            ORDER BY jersey_number, player_id
            "#,
        )?;
        let named = stmt
            .query_map(params![match_id, team_id], |row| {
                let player_id: i64 = row.get(0)?;
                let position: String = row.get(1)?;
                Ok((player_id, position))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT s.player_id, s.position, s.tries,
                   m.match_id, m.season_id, m.round, m.home_team_id, m.away_team_id, m.kickoff
            FROM player_match_stats s
            JOIN matches m ON m.match_id = s.match_id
            JOIN team_lists tl ON tl.player_id = s.player_id
            WHERE tl.match_id = ?1 AND tl.team_id = ?2 AND tl.is_replacement = 0
            "#,
        )?;
        let appearances = stmt
            .query_map(params![match_id, team_id], |row| {
                let player_id: i64 = row.get(0)?;
                let position: String = row.get(1)?;
                let tries: u32 = row.get(2)?;
                let played_in = MatchInfo {
                    match_id: row.get(3)?,
                    season_id: row.get(4)?,
                    round: row.get(5)?,
                    home_team_id: row.get(6)?,
                    away_team_id: row.get(7)?,
                    kickoff: row.get(8)?,
                };
                Ok((player_id, position, tries, played_in))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut totals: HashMap<i64, (u32, u32)> = HashMap::new();
        for (player_id, label, tries, played_in) in appearances {
            if !seasons.is_empty() && !seasons.contains(&played_in.season_id) {
                continue;
            }
            if !played_before(&played_in, &target) {
                continue;
            }
            if let Some(group) = &wanted_group {
                if PositionGroup::from_label(&label) != *group {
                    continue;
                }
            }
            let entry = totals.entry(player_id).or_insert((0, 0));
            entry.0 = entry.0.saturating_add(tries);
            entry.1 += 1;
        }

        let histories = named
            .into_iter()
            .map(|(player_id, position)| {
                let (tries, matches_played) = totals.get(&player_id).copied().unwrap_or((0, 0));
                PlayerHistory {
                    player_id: player_id.to_string(),
                    position,
                    tries,
                    matches_played,
                }
            })
            .collect();

        Ok(histories)
    }

    /// Stored try distribution of a team for a match
    pub fn get_try_distribution(
        &self,
        match_id: i64,
        team_id: i64,
    ) -> Result<Option<TryCountDistribution>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT tries, probability
            FROM team_try_distributions
            WHERE match_id = ?1 AND team_id = ?2
            "#,
        )?;

        let probs = stmt
            .query_map(params![match_id, team_id], |row| {
                let tries: u32 = row.get(0)?;
                let probability: f64 = row.get(1)?;
                Ok((tries, probability))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

        if probs.is_empty() {
            return Ok(None);
        }

        let dist = TryCountDistribution::new(probs).with_context(|| {
            format!(
                "Stored try distribution for match {} team {} is invalid",
                match_id, team_id
            )
        })?;
        Ok(Some(dist))
    }

    /// All outcome bins for a match
    pub fn get_outcome_bins(&self, match_id: i64) -> Result<Vec<OutcomeBin>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT margin, total_points, home_try_dist, away_try_dist, count
            FROM outcome_bins
            WHERE match_id = ?1
            ORDER BY margin, total_points
            "#,
        )?;

        let rows = stmt
            .query_map([match_id], |row| {
                let margin: i32 = row.get(0)?;
                let total_points: i32 = row.get(1)?;
                let home: String = row.get(2)?;
                let away: String = row.get(3)?;
                let count: i64 = row.get(4)?;
                Ok((margin, total_points, home, away, count))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(margin, total_points, home, away, count)| -> Result<OutcomeBin> {
                Ok(OutcomeBin {
                    margin,
                    total_points,
                    home_try_dist: serde_json::from_str(&home)
                        .context("Failed to parse home try distribution")?,
                    away_try_dist: serde_json::from_str(&away)
                        .context("Failed to parse away try distribution")?,
                    count: u64::try_from(count).context("Negative bin count")?,
                })
            })
            .collect()
    }

    /// Get match count
    pub fn get_match_count(&self) -> Result<i32> {
        let count: i32 = self
            .conn
            .query_row("SELECT COUNT(*) FROM matches", [], |row| row.get(0))?;
        Ok(count)
    }
}
