//! Per-bot log files fed by `bot.log` panel events.

use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};

use tokio::{fs, io::AsyncWriteExt};

use crate::model::bot::BotFamily;

/// Appends bot log lines under `{root}/{family}/{template}.log`.
#[derive(Debug, Clone)]
pub struct BotLogStore {
    root: PathBuf,
}

impl BotLogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of a bot's log file. Template names come from users, so anything outside
    /// `[A-Za-z0-9_-]` is replaced to keep the file inside the family directory.
    pub fn path_for(&self, family: BotFamily, template_name: &str) -> PathBuf {
        let file: String = template_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        self.root
            .join(family.as_str())
            .join(format!("{}.log", file))
    }

    pub async fn append(
        &self,
        family: BotFamily,
        template_name: &str,
        line: &str,
    ) -> io::Result<()> {
        let path = self.path_for(family, template_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.trim_end_matches('\n').as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }

    /// Reads a bot's whole log, empty when nothing was logged yet.
    pub async fn read(&self, family: BotFamily, template_name: &str) -> io::Result<String> {
        match fs::read_to_string(self.path_for(family, template_name)).await {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err),
        }
    }

    /// Removes a bot's log file.
    ///
    /// # Returns
    /// - `Ok(true)` - File removed
    /// - `Ok(false)` - There was no file
    pub async fn purge(&self, family: BotFamily, template_name: &str) -> io::Result<bool> {
        match fs::remove_file(self.path_for(family, template_name)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_and_purges() {
        let dir = tempfile::tempdir().unwrap();
        let store = BotLogStore::new(dir.path());

        store.append(BotFamily::ManagerBot, "lobby", "joined").await.unwrap();
        store.append(BotFamily::ManagerBot, "lobby", "moved\n").await.unwrap();

        let contents = store.read(BotFamily::ManagerBot, "lobby").await.unwrap();
        assert_eq!(contents, "joined\nmoved\n");

        assert!(store.purge(BotFamily::ManagerBot, "lobby").await.unwrap());
        assert!(!store.purge(BotFamily::ManagerBot, "lobby").await.unwrap());
        assert!(store.read(BotFamily::ManagerBot, "lobby").await.unwrap().is_empty());
    }

    #[test]
    fn keeps_paths_inside_family_directory() {
        let store = BotLogStore::new("/var/log/bots");

        let path = store.path_for(BotFamily::AudioBot, "../../etc/passwd");

        assert_eq!(
            path,
            PathBuf::from("/var/log/bots/audio_bot/______etc_passwd.log")
        );
    }
}
