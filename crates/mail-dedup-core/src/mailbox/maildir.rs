use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::{is_maildir, Mailbox, RawMail};
use crate::config::InputFormat;
use crate::error::Error;
use crate::mail::MailId;

const SUBFOLDERS: [&str; 2] = ["new", "cur"];

/// A maildir. Mail ids are paths relative to the maildir root, like
/// `cur/1622534400.M1P2.host:2,S`.
pub struct Maildir {
    path: PathBuf,
    ids: Vec<MailId>,
}

impl Maildir {
    pub fn open(path: &Path) -> Result<Self, Error> {
        if !is_maildir(path) {
            return Err(Error::UnrecognizedMailbox {
                path: path.to_path_buf(),
                reason: "missing cur/ or new/ subfolder".to_string(),
            });
        }

        let mut ids = Vec::new();
        for subfolder in SUBFOLDERS {
            let walker = WalkDir::new(path.join(subfolder))
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name();
            for entry in walker {
                let entry = entry.map_err(io::Error::from)?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let file_name = entry.file_name().to_string_lossy();
                // Files starting with a dot are not mails.
                if file_name.starts_with('.') {
                    continue;
                }
                ids.push(MailId(format!("{subfolder}/{file_name}")));
            }
        }
        debug!("{} mails listed in {}", ids.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            ids,
        })
    }

    fn mail_path(&self, id: &MailId) -> Result<PathBuf, Error> {
        if !self.ids.contains(id) {
            return Err(Error::MailNotFound {
                path: self.path.clone(),
                id: id.clone(),
            });
        }
        Ok(self.path.join(&id.0))
    }
}

impl Mailbox for Maildir {
    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> InputFormat {
        InputFormat::Maildir
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn ids(&self) -> Vec<MailId> {
        self.ids.clone()
    }

    fn read(&self, id: &MailId) -> Result<RawMail, Error> {
        let path = self.mail_path(id)?;
        let bytes = fs::read(&path)?;
        let modified = fs::metadata(&path)?.modified().ok();
        Ok(RawMail {
            bytes,
            path,
            modified,
        })
    }

    fn remove(&mut self, id: &MailId) -> Result<(), Error> {
        let path = self.mail_path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::MailNotFound {
                    path: self.path.clone(),
                    id: id.clone(),
                });
            }
            Err(err) => return Err(err.into()),
        }
        self.ids.retain(|known| known != id);
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        debug!("Closing {}", self.path.display());
        Ok(())
    }
}
