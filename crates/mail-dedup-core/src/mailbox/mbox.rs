use std::ffi::OsString;
use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{Mailbox, RawMail};
use crate::config::InputFormat;
use crate::error::Error;
use crate::mail::MailId;

const SEPARATOR: &[u8] = b"From ";

/// Dot-lock file `<mbox>.lock`, removed when dropped.
struct DotLock {
    path: PathBuf,
}

impl DotLock {
    fn acquire(mbox_path: &Path, force_unlock: bool) -> Result<Self, Error> {
        let mut lock_path = OsString::from(mbox_path.as_os_str());
        lock_path.push(".lock");
        let path = PathBuf::from(lock_path);

        let create = || OpenOptions::new().write(true).create_new(true).open(&path);
        match create() {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                if !force_unlock {
                    return Err(Error::Locked(mbox_path.to_path_buf()));
                }
                warn!("Forcing removal of stale lock {}", path.display());
                fs::remove_file(&path)?;
                create()?;
            }
            Err(err) => return Err(err.into()),
        }
        debug!("Acquired {}", path.display());

        Ok(Self { path })
    }
}

impl Drop for DotLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!("Cannot release lock {}: {}", self.path.display(), err);
        }
    }
}

struct MboxEntry {
    id: MailId,
    /// Byte range in the current file, `From ` line included.
    offset: usize,
    len: usize,
}

/// An mbox file. Mail ids are the ordinal of each message at opening time
/// and stay valid after removals.
pub struct Mbox {
    path: PathBuf,
    force_unlock: bool,
    lock: Option<DotLock>,
    entries: Vec<MboxEntry>,
    file_len: usize,
    content: Option<Vec<u8>>,
}

/// Offsets of every line starting with the `From ` separator.
fn message_starts(content: &[u8]) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut line_start = 0;
    while line_start < content.len() {
        if content[line_start..].starts_with(SEPARATOR) {
            starts.push(line_start);
        }
        match content[line_start..].iter().position(|b| *b == b'\n') {
            Some(pos) => line_start += pos + 1,
            None => break,
        }
    }
    starts
}

impl Mbox {
    pub fn open(path: &Path, force_unlock: bool) -> Result<Self, Error> {
        if !path.is_file() {
            return Err(Error::UnrecognizedMailbox {
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }
        let lock = DotLock::acquire(path, force_unlock)?;

        let content = fs::read(path)?;
        if !content.is_empty() && !content.starts_with(SEPARATOR) {
            return Err(Error::UnrecognizedMailbox {
                path: path.to_path_buf(),
                reason: "file does not start with a `From ` line".to_string(),
            });
        }

        let starts = message_starts(&content);
        let entries = starts
            .iter()
            .enumerate()
            .map(|(index, &offset)| {
                let end = starts.get(index + 1).copied().unwrap_or(content.len());
                MboxEntry {
                    id: MailId(index.to_string()),
                    offset,
                    len: end - offset,
                }
            })
            .collect::<Vec<_>>();
        debug!("{} mails listed in {}", entries.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            force_unlock,
            lock: Some(lock),
            entries,
            file_len: content.len(),
            content: Some(content),
        })
    }

    fn position(&self, id: &MailId) -> Result<usize, Error> {
        self.entries
            .iter()
            .position(|entry| &entry.id == id)
            .ok_or_else(|| Error::MailNotFound {
                path: self.path.clone(),
                id: id.clone(),
            })
    }

    fn read_current(&self) -> Result<Vec<u8>, Error> {
        let content = fs::read(&self.path)?;
        if content.len() != self.file_len {
            return Err(Error::MailboxChanged(self.path.clone()));
        }
        Ok(content)
    }

    /// Replace the file through a synced temporary sibling and a rename.
    fn write_atomically(&self, content: &[u8]) -> Result<(), Error> {
        let mut tmp_path = OsString::from(self.path.as_os_str());
        tmp_path.push(".mdedup-tmp");
        let tmp_path = PathBuf::from(tmp_path);

        let permissions = fs::metadata(&self.path)?.permissions();
        if let Err(err) = write_synced(&tmp_path, content, permissions) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn write_synced(path: &Path, content: &[u8], permissions: Permissions) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content)?;
    file.set_permissions(permissions)?;
    file.sync_all()
}

impl Mailbox for Mbox {
    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> InputFormat {
        InputFormat::Mbox
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn ids(&self) -> Vec<MailId> {
        self.entries.iter().map(|entry| entry.id.clone()).collect()
    }

    fn read(&self, id: &MailId) -> Result<RawMail, Error> {
        let entry = &self.entries[self.position(id)?];
        let reloaded;
        let content = match &self.content {
            Some(content) => content,
            None => {
                reloaded = self.read_current()?;
                &reloaded
            }
        };

        let mut message = &content[entry.offset..entry.offset + entry.len];
        // Drop the `From ` envelope line and the blank line separating
        // this message from the next one.
        message = match message.iter().position(|b| *b == b'\n') {
            Some(pos) => &message[pos + 1..],
            None => &[],
        };
        if message.ends_with(b"\n\n") {
            message = &message[..message.len() - 1];
        }

        Ok(RawMail {
            bytes: message.to_vec(),
            path: self.path.clone(),
            modified: fs::metadata(&self.path)?.modified().ok(),
        })
    }

    fn remove(&mut self, id: &MailId) -> Result<(), Error> {
        self.remove_many(std::slice::from_ref(id), &mut |_| {})
    }

    /// Drop every listed message with a single rewrite of the file. Nothing
    /// is written if any id is unknown.
    fn remove_many(
        &mut self,
        ids: &[MailId],
        on_removed: &mut dyn FnMut(&MailId),
    ) -> Result<(), Error> {
        let mut doomed = ids
            .iter()
            .map(|id| self.position(id))
            .collect::<Result<Vec<_>, _>>()?;
        doomed.sort_unstable();
        doomed.dedup();
        if doomed.is_empty() {
            return Ok(());
        }

        let _relock = match self.lock {
            Some(_) => None,
            None => Some(DotLock::acquire(&self.path, self.force_unlock)?),
        };

        let content = self.read_current()?;
        let mut kept = Vec::with_capacity(content.len());
        let mut entries = Vec::with_capacity(self.entries.len() - doomed.len());
        let mut removed = Vec::with_capacity(doomed.len());
        for (index, entry) in self.entries.iter().enumerate() {
            if doomed.binary_search(&index).is_ok() {
                removed.push(entry.id.clone());
                continue;
            }
            entries.push(MboxEntry {
                id: entry.id.clone(),
                offset: kept.len(),
                len: entry.len,
            });
            kept.extend_from_slice(&content[entry.offset..entry.offset + entry.len]);
        }
        self.write_atomically(&kept)?;
        debug!(
            "Rewrote {} without {} mails",
            self.path.display(),
            removed.len()
        );

        self.entries = entries;
        self.file_len = kept.len();
        if self.content.is_some() {
            self.content = Some(kept);
        }
        for id in &removed {
            on_removed(id);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        debug!("Closing {}", self.path.display());
        self.content = None;
        self.lock = None;
        Ok(())
    }
}
