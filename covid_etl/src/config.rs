use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::rates::ZeroPopulationPolicy;
use crate::COL;

/// Spellings used by the case time series mapped to the spelling used by the population table.
const DEFAULT_CORRECTIONS: [(&str, &str); 10] = [
    ("US", "United States"),
    ("Korea, South", "South Korea"),
    ("Burma", "Myanmar"),
    ("Czechia", "Czech Republic"),
    ("Taiwan*", "Taiwan"),
    ("Cote d'Ivoire", "Ivory Coast"),
    ("Congo (Brazzaville)", "Republic of the Congo"),
    ("Congo (Kinshasa)", "DR Congo"),
    ("West Bank and Gaza", "Palestine"),
    ("Cape Verde", "Cabo Verde"),
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub output_dir: PathBuf,
    pub merged_file_name: String,
    pub rates_file_name: String,
    pub top_n: usize,
    pub zero_population: ZeroPopulationPolicy,
    pub country_aliases: Vec<String>,
    pub corrections: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output_dir: "data".into(),
            merged_file_name: "merged_covid_population.csv".into(),
            rates_file_name: "covid_cases_per_100k.csv".into(),
            top_n: 10,
            zero_population: ZeroPopulationPolicy::default(),
            country_aliases: COL::COUNTRY_ALIASES.iter().map(|s| s.to_string()).collect(),
            corrections: DEFAULT_CORRECTIONS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }
}

impl Config {
    pub fn merged_path(&self) -> PathBuf {
        self.output_dir.join(&self.merged_file_name)
    }

    pub fn rates_path(&self) -> PathBuf {
        self.output_dir.join(&self.rates_file_name)
    }
}
