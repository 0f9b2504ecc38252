pub mod maildir;
pub mod mbox;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::info;

use crate::config::InputFormat;
use crate::error::Error;
use crate::mail::MailId;

pub use maildir::Maildir;
pub use mbox::Mbox;

/// Raw content of one mail as stored in its mailbox.
#[derive(Debug, Clone)]
pub struct RawMail {
    pub bytes: Vec<u8>,
    /// Location for display: the mail file, or the mailbox file holding it.
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

/// An opened mail store.
pub trait Mailbox {
    fn path(&self) -> &Path;

    fn format(&self) -> InputFormat;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of the mails currently present, in a stable order.
    fn ids(&self) -> Vec<MailId>;

    fn read(&self, id: &MailId) -> Result<RawMail, Error>;

    /// Delete a mail in place.
    fn remove(&mut self, id: &MailId) -> Result<(), Error>;

    /// Delete several mails, calling `on_removed` once each is gone.
    ///
    /// Stores that rewrite a whole file override this to do it once per
    /// batch.
    fn remove_many(
        &mut self,
        ids: &[MailId],
        on_removed: &mut dyn FnMut(&MailId),
    ) -> Result<(), Error> {
        for id in ids {
            self.remove(id)?;
            on_removed(id);
        }
        Ok(())
    }

    /// Release locks and cached content. Removal stays possible afterwards.
    fn close(&mut self) -> Result<(), Error>;
}

pub fn is_maildir(path: &Path) -> bool {
    path.is_dir() && path.join("cur").is_dir() && path.join("new").is_dir()
}

pub fn detect_format(path: &Path) -> Result<InputFormat, Error> {
    if is_maildir(path) {
        Ok(InputFormat::Maildir)
    } else if path.is_file() {
        Ok(InputFormat::Mbox)
    } else {
        Err(Error::UnrecognizedMailbox {
            path: path.to_path_buf(),
            reason: "neither a maildir nor an mbox file".to_string(),
        })
    }
}

/// Open a mail store, detecting its format unless one is forced.
pub fn open_box(
    path: &Path,
    format: Option<InputFormat>,
    force_unlock: bool,
) -> Result<Box<dyn Mailbox>, Error> {
    let format = match format {
        Some(format) => format,
        None => detect_format(path)?,
    };
    info!("Opening {} as {}...", path.display(), format);

    Ok(match format {
        InputFormat::Maildir => Box::new(Maildir::open(path)?),
        InputFormat::Mbox => Box::new(Mbox::open(path, force_unlock)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_detect_format() {
        let tmp = tempdir().unwrap();

        let maildir = tmp.path().join("inbox");
        for sub in ["cur", "new", "tmp"] {
            fs::create_dir_all(maildir.join(sub)).unwrap();
        }
        assert_eq!(detect_format(&maildir).unwrap(), InputFormat::Maildir);

        let mbox = tmp.path().join("archive.mbox");
        fs::write(&mbox, "").unwrap();
        assert_eq!(detect_format(&mbox).unwrap(), InputFormat::Mbox);

        let plain_dir = tmp.path().join("plain");
        fs::create_dir_all(&plain_dir).unwrap();
        assert!(matches!(
            detect_format(&plain_dir),
            Err(Error::UnrecognizedMailbox { .. })
        ));
    }

    #[test]
    fn test_forced_format_mismatch() {
        let tmp = tempdir().unwrap();
        let mbox = tmp.path().join("archive.mbox");
        fs::write(&mbox, "").unwrap();
        assert!(open_box(&mbox, Some(InputFormat::Maildir), false).is_err());
    }
}
