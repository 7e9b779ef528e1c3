use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::io::Write as IoWrite;
use std::path::Path;

/// ResultEntry contains the outcome of a single horse.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResultEntry {
    pub horse_id: usize,
    pub name: String,
    pub skill_name: String,
    pub skill_activated: bool,
    pub finish_rank: Option<u32>,
    /// (s) race time from the release until the finish line
    pub race_time: Option<f64>,
}

/// RaceResult contains all race information that is required for post-processing the results.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct RaceResult {
    pub course_name: String,
    pub weather_name: String,
    pub track_condition: String,
    pub entries: Vec<ResultEntry>,
    pub winner: Option<usize>,
    pub finish_order: Vec<usize>,
}

impl RaceResult {
    pub fn winner_name(&self) -> Option<&str> {
        self.winner.map(|idx| self.entries[idx].name.as_str())
    }

    fn format_finish_order(&self) -> Result<String, std::fmt::Error> {
        let mut content = String::new();
        writeln!(
            &mut content,
            "RESULT: {} ({}, {})",
            self.course_name, self.weather_name, self.track_condition
        )?;
        writeln!(&mut content, "pos, no, name                , race time, skill")?;

        for (pos, &idx) in self.finish_order.iter().enumerate() {
            let entry = &self.entries[idx];
            let skill = if entry.skill_activated {
                format!("{} (activated)", entry.skill_name)
            } else {
                entry.skill_name.to_owned()
            };

            match entry.race_time {
                Some(race_time) => writeln!(
                    &mut content,
                    "{:3}, {:2}, {:20}, {:8.3}s, {}",
                    pos + 1,
                    entry.horse_id,
                    entry.name,
                    race_time,
                    skill
                )?,
                None => writeln!(
                    &mut content,
                    "{:3}, {:2}, {:20}, {:>9}, {}",
                    pos + 1,
                    entry.horse_id,
                    entry.name,
                    "-",
                    skill
                )?,
            }
        }

        // horses without a rank (aborted race)
        for entry in self
            .entries
            .iter()
            .filter(|entry| entry.finish_rank.is_none())
        {
            writeln!(
                &mut content,
                "DNF, {:2}, {:20}, {:>9}, {}",
                entry.horse_id, entry.name, "-", entry.skill_name
            )?;
        }

        Ok(content)
    }

    /// print_finish_order prints the finish order with race times to the console output.
    pub fn print_finish_order(&self) -> anyhow::Result<()> {
        print!("{}", self.format_finish_order()?);
        Ok(())
    }

    /// write_finish_order_to_file writes the finish order to a text file (default
    /// output/last_run.txt). Returns the path to the written file.
    pub fn write_finish_order_to_file(&self, path: Option<&Path>) -> anyhow::Result<String> {
        let content = self.format_finish_order()?;

        let out_path = match path {
            Some(p) => p.to_path_buf(),
            None => Path::new("output").join("last_run.txt"),
        };
        if let Some(out_dir) = out_path.parent() {
            if !out_dir.as_os_str().is_empty() {
                std::fs::create_dir_all(out_dir)?;
            }
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&out_path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;

        Ok(out_path.to_string_lossy().into_owned())
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// WinTally aggregates the outcome of multiple simulation runs.
#[derive(Debug, Default, Clone, Serialize)]
pub struct WinTally {
    pub no_races: u32,
    /// horse name -> (wins, sum of finish ranks)
    pub per_horse: BTreeMap<String, (u32, u32)>,
}

impl WinTally {
    pub fn add(&mut self, result: &RaceResult) {
        self.no_races += 1;
        for entry in result.entries.iter() {
            let tally = self.per_horse.entry(entry.name.to_owned()).or_default();
            if result.winner == Some(entry.horse_id) {
                tally.0 += 1;
            }
            tally.1 += entry.finish_rank.unwrap_or(result.entries.len() as u32);
        }
    }

    pub fn wins(&self, name: &str) -> u32 {
        self.per_horse.get(name).map_or(0, |tally| tally.0)
    }

    pub fn print_summary(&self) {
        println!("RESULT: Wins after {} races", self.no_races);
        let mut rows: Vec<(&String, &(u32, u32))> = self.per_horse.iter().collect();
        rows.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

        for (name, (wins, rank_sum)) in rows {
            println!(
                "{:20} {:5} wins ({:5.1}%), avg. rank {:.2}",
                name,
                wins,
                100.0 * *wins as f64 / self.no_races.max(1) as f64,
                *rank_sum as f64 / self.no_races.max(1) as f64
            );
        }
    }
}
