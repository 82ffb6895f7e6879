//! Code dictionaries: ten-codes, callsigns, and agency signal phrases.
//!
//! All dictionaries are loaded once at startup and shared read-only with the
//! pipeline; nothing here mutates after load. Ten-codes and signals come from
//! flat text files maintained alongside the capture tool, callsigns from the
//! registry database the capture tool appends observations to.

use crate::config::DictionaryConfig;
use crate::error::{Result, TrunkscribeError};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::info;

/// One loaded dictionary set: everything enrichment needs for one talkgroup.
#[derive(Debug, Clone, Default)]
pub struct CodeDictionary {
    /// Ten-code -> description ("10-4" -> "Acknowledged").
    pub ten_codes: HashMap<String, String>,
    /// Callsign -> operator name, most recent observation per callsign.
    pub callsigns: HashMap<String, String>,
    /// Signal phrase -> description; empty for talkgroups without signals.
    pub signals: HashMap<String, String>,
}

impl CodeDictionary {
    /// An empty dictionary; enrichment against it yields no matches.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// The process-wide dictionaries plus the talkgroup selection rule.
///
/// Certain talkgroups (a state-patrol system, typically) use their own
/// ten-code table and an additional signal-phrase table; everyone else gets
/// the county-wide set. Which talkgroups those are is configuration.
#[derive(Debug, Clone, Default)]
pub struct DictionarySet {
    standard: CodeDictionary,
    agency: Option<CodeDictionary>,
    agency_talkgroups: HashSet<String>,
}

impl DictionarySet {
    /// Build a set from already-loaded dictionaries.
    pub fn new(
        standard: CodeDictionary,
        agency: Option<CodeDictionary>,
        agency_talkgroups: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            standard,
            agency,
            agency_talkgroups: agency_talkgroups.into_iter().collect(),
        }
    }

    /// Load every configured dictionary source.
    ///
    /// Missing optional sources simply leave their section empty; a
    /// configured path that cannot be read or parsed is an error.
    pub async fn load(config: &DictionaryConfig) -> Result<Self> {
        let callsigns = match &config.callsign_db {
            Some(path) => load_callsigns(path).await?,
            None => HashMap::new(),
        };

        let standard = CodeDictionary {
            ten_codes: match &config.ten_codes {
                Some(path) => load_code_file(path)?,
                None => HashMap::new(),
            },
            callsigns: callsigns.clone(),
            signals: HashMap::new(),
        };

        let agency = match &config.agency_ten_codes {
            Some(path) => Some(CodeDictionary {
                ten_codes: load_code_file(path)?,
                callsigns,
                signals: match &config.signals {
                    Some(path) => load_signal_file(path)?,
                    None => HashMap::new(),
                },
            }),
            None => None,
        };

        info!(
            ten_codes = standard.ten_codes.len(),
            callsigns = standard.callsigns.len(),
            agency = agency.is_some(),
            "dictionaries loaded"
        );

        Ok(Self {
            standard,
            agency,
            agency_talkgroups: config.agency_talkgroups.iter().cloned().collect(),
        })
    }

    /// Pick the dictionary for a talkgroup.
    pub fn select(&self, talkgroup_id: &str) -> &CodeDictionary {
        if self.agency_talkgroups.contains(talkgroup_id)
            && let Some(agency) = &self.agency
        {
            return agency;
        }
        &self.standard
    }
}

/// Load a "<code> <description>" file, one entry per line.
pub fn load_code_file(path: &Path) -> Result<HashMap<String, String>> {
    let contents = read_dictionary(path)?;
    let mut codes = HashMap::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (code, description) =
            line.split_once(' ')
                .ok_or_else(|| TrunkscribeError::Dictionary {
                    path: path.display().to_string(),
                    message: format!("line {} has no description", idx + 1),
                })?;
        codes.insert(code.to_string(), description.trim().to_string());
    }
    Ok(codes)
}

/// Load a signal-phrase file.
///
/// Signal phrases are two words ("Signal 7"), so the first two
/// whitespace-separated tokens form the key and the remainder the
/// description.
pub fn load_signal_file(path: &Path) -> Result<HashMap<String, String>> {
    let contents = read_dictionary(path)?;
    let mut signals = HashMap::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.splitn(3, ' ');
        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(first), Some(second), Some(description)) => {
                signals.insert(
                    format!("{} {}", first, second),
                    description.trim().to_string(),
                );
            }
            _ => {
                return Err(TrunkscribeError::Dictionary {
                    path: path.display().to_string(),
                    message: format!("line {} is not \"<word> <word> <description>\"", idx + 1),
                });
            }
        }
    }
    Ok(signals)
}

/// Load the callsign registry, keeping the most recent row per callsign.
pub async fn load_callsigns(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Err(TrunkscribeError::Dictionary {
            path: path.display().to_string(),
            message: "callsign database does not exist".to_string(),
        });
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(false)
        .read_only(true);
    let pool = SqlitePool::connect_with(options)
        .await
        .map_err(|e| TrunkscribeError::Dictionary {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let rows = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT c1.callsign, c1.name
        FROM callsign_data c1
        JOIN (
            SELECT callsign, MAX(timestamp) AS max_timestamp
            FROM callsign_data
            GROUP BY callsign
        ) c2 ON c1.callsign = c2.callsign AND c1.timestamp = c2.max_timestamp
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| TrunkscribeError::Dictionary {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    pool.close().await;
    Ok(rows.into_iter().collect())
}

fn read_dictionary(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| TrunkscribeError::Dictionary {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn test_load_code_file() {
        let file = write_file("10-4 Acknowledged\n10-42A Traffic accident, injuries\n\n10-50 Wreck\n");
        let codes = load_code_file(file.path()).unwrap();
        assert_eq!(codes.len(), 3);
        assert_eq!(codes.get("10-4").map(String::as_str), Some("Acknowledged"));
        assert_eq!(
            codes.get("10-42A").map(String::as_str),
            Some("Traffic accident, injuries")
        );
    }

    #[test]
    fn test_load_code_file_rejects_bare_code() {
        let file = write_file("10-4 Acknowledged\n10-99\n");
        let err = load_code_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_load_code_file_missing_path() {
        assert!(load_code_file(Path::new("/nonexistent/tencodes.txt")).is_err());
    }

    #[test]
    fn test_load_signal_file_two_token_phrases() {
        let file = write_file("Signal 7 Intoxicated person\nSignal 20 Mental subject\n");
        let signals = load_signal_file(file.path()).unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(
            signals.get("Signal 7").map(String::as_str),
            Some("Intoxicated person")
        );
        assert_eq!(
            signals.get("Signal 20").map(String::as_str),
            Some("Mental subject")
        );
    }

    #[test]
    fn test_load_signal_file_rejects_short_line() {
        let file = write_file("Signal 7\n");
        assert!(load_signal_file(file.path()).is_err());
    }

    #[tokio::test]
    async fn test_load_callsigns_most_recent_wins() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("callsigns.db");

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.unwrap();
        sqlx::query(
            "CREATE TABLE callsign_data (callsign TEXT, name TEXT, timestamp INTEGER)",
        )
        .execute(&pool)
        .await
        .unwrap();
        for (callsign, name, ts) in [
            ("David-12", "J. Older", 100),
            ("David-12", "J. Newer", 200),
            ("Adam-3", "B. Only", 150),
        ] {
            sqlx::query("INSERT INTO callsign_data (callsign, name, timestamp) VALUES (?, ?, ?)")
                .bind(callsign)
                .bind(name)
                .bind(ts)
                .execute(&pool)
                .await
                .unwrap();
        }
        pool.close().await;

        let callsigns = load_callsigns(&db_path).await.unwrap();
        assert_eq!(callsigns.len(), 2);
        assert_eq!(callsigns.get("David-12").map(String::as_str), Some("J. Newer"));
        assert_eq!(callsigns.get("Adam-3").map(String::as_str), Some("B. Only"));
    }

    #[tokio::test]
    async fn test_load_callsigns_missing_db() {
        assert!(load_callsigns(Path::new("/nonexistent/callsigns.db"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_dictionary_set_selection() {
        let ten_codes = write_file("10-4 Acknowledged\n");
        let agency_codes = write_file("10-4 Affirmative\n10-50 Collision\n");
        let signals = write_file("Signal 7 Intoxicated person\n");

        let config = DictionaryConfig {
            ten_codes: Some(ten_codes.path().to_path_buf()),
            agency_ten_codes: Some(agency_codes.path().to_path_buf()),
            signals: Some(signals.path().to_path_buf()),
            callsign_db: None,
            agency_talkgroups: vec!["52198".to_string(), "52201".to_string()],
        };

        let set = DictionarySet::load(&config).await.unwrap();

        let agency = set.select("52198");
        assert_eq!(agency.ten_codes.get("10-4").map(String::as_str), Some("Affirmative"));
        assert_eq!(agency.signals.len(), 1);

        let standard = set.select("12345");
        assert_eq!(
            standard.ten_codes.get("10-4").map(String::as_str),
            Some("Acknowledged")
        );
        assert!(standard.signals.is_empty());
    }

    #[tokio::test]
    async fn test_dictionary_set_agency_talkgroup_without_agency_dict() {
        let config = DictionaryConfig {
            agency_talkgroups: vec!["52198".to_string()],
            ..DictionaryConfig::default()
        };
        let set = DictionarySet::load(&config).await.unwrap();
        // No agency dictionary configured: selection falls back to standard.
        let dict = set.select("52198");
        assert!(dict.ten_codes.is_empty());
    }
}
