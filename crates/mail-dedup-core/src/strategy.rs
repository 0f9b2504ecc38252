use regex::Regex;

use crate::duplicate_set::DuplicateSet;
use crate::error::Error;
use crate::mail::Mail;

/// Policy picking, within a duplicate set, the mails to remove.
///
/// Returning every mail of the set is allowed but the engine then treats
/// the set as skipped.
pub trait SelectionStrategy {
    fn name(&self) -> &str;

    fn choose<'a>(&self, set: &'a DuplicateSet) -> Vec<&'a Mail>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    SelectOlder,
    SelectOldest,
    SelectNewer,
    SelectNewest,
    SelectSmaller,
    SelectSmallest,
    SelectBigger,
    SelectBiggest,
    SelectMatchingPath,
    SelectNonMatchingPath,
    SelectOne,
    SelectAllButOne,
}

pub struct StrategyInfo {
    pub name: &'static str,
    pub kind: StrategyKind,
    pub description: &'static str,
}

pub const STRATEGIES: &[StrategyInfo] = &[
    StrategyInfo {
        name: "select-older",
        kind: StrategyKind::SelectOlder,
        description: "Select all mails older than the newest one of the set.",
    },
    StrategyInfo {
        name: "select-oldest",
        kind: StrategyKind::SelectOldest,
        description: "Select the oldest mails of the set.",
    },
    StrategyInfo {
        name: "select-newer",
        kind: StrategyKind::SelectNewer,
        description: "Select all mails newer than the oldest one of the set.",
    },
    StrategyInfo {
        name: "select-newest",
        kind: StrategyKind::SelectNewest,
        description: "Select the newest mails of the set.",
    },
    StrategyInfo {
        name: "select-smaller",
        kind: StrategyKind::SelectSmaller,
        description: "Select all mails smaller than the biggest one of the set.",
    },
    StrategyInfo {
        name: "select-smallest",
        kind: StrategyKind::SelectSmallest,
        description: "Select the smallest mails of the set.",
    },
    StrategyInfo {
        name: "select-bigger",
        kind: StrategyKind::SelectBigger,
        description: "Select all mails bigger than the smallest one of the set.",
    },
    StrategyInfo {
        name: "select-biggest",
        kind: StrategyKind::SelectBiggest,
        description: "Select the biggest mails of the set.",
    },
    StrategyInfo {
        name: "select-matching-path",
        kind: StrategyKind::SelectMatchingPath,
        description: "Select all mails whose path matches the regular expression.",
    },
    StrategyInfo {
        name: "select-non-matching-path",
        kind: StrategyKind::SelectNonMatchingPath,
        description: "Select all mails whose path does not match the regular expression.",
    },
    StrategyInfo {
        name: "select-one",
        kind: StrategyKind::SelectOne,
        description: "Select the first mail of the set, ordered by source and id.",
    },
    StrategyInfo {
        name: "select-all-but-one",
        kind: StrategyKind::SelectAllButOne,
        description: "Select all mails but the first one, ordered by source and id.",
    },
];

/// `discard-*` names select the complement of their `select-*` counterpart.
pub const ALIASES: &[(&str, &str)] = &[
    ("discard-older", "select-newest"),
    ("discard-oldest", "select-newer"),
    ("discard-newer", "select-oldest"),
    ("discard-newest", "select-older"),
    ("discard-smaller", "select-biggest"),
    ("discard-smallest", "select-bigger"),
    ("discard-bigger", "select-smallest"),
    ("discard-biggest", "select-smaller"),
    ("discard-matching-path", "select-non-matching-path"),
    ("discard-non-matching-path", "select-matching-path"),
    ("discard-one", "select-all-but-one"),
    ("discard-all-but-one", "select-one"),
];

enum Rule {
    Older,
    Oldest,
    Newer,
    Newest,
    Smaller,
    Smallest,
    Bigger,
    Biggest,
    MatchingPath(Regex),
    NonMatchingPath(Regex),
    One,
    AllButOne,
}

/// A known strategy, resolved once from its name.
pub struct Strategy {
    name: String,
    rule: Rule,
}

pub fn lookup(name: &str) -> Option<&'static StrategyInfo> {
    let canonical = ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, target)| *target)
        .unwrap_or(name);
    STRATEGIES.iter().find(|info| info.name == canonical)
}

impl Strategy {
    pub fn resolve(name: &str, regexp: Option<&str>) -> Result<Self, Error> {
        let info = lookup(name).ok_or_else(|| Error::UnknownStrategy(name.to_string()))?;
        let compile = || -> Result<Regex, Error> {
            let pattern = regexp.ok_or_else(|| Error::MissingRegexp(name.to_string()))?;
            Ok(Regex::new(pattern)?)
        };

        let rule = match info.kind {
            StrategyKind::SelectOlder => Rule::Older,
            StrategyKind::SelectOldest => Rule::Oldest,
            StrategyKind::SelectNewer => Rule::Newer,
            StrategyKind::SelectNewest => Rule::Newest,
            StrategyKind::SelectSmaller => Rule::Smaller,
            StrategyKind::SelectSmallest => Rule::Smallest,
            StrategyKind::SelectBigger => Rule::Bigger,
            StrategyKind::SelectBiggest => Rule::Biggest,
            StrategyKind::SelectMatchingPath => Rule::MatchingPath(compile()?),
            StrategyKind::SelectNonMatchingPath => Rule::NonMatchingPath(compile()?),
            StrategyKind::SelectOne => Rule::One,
            StrategyKind::SelectAllButOne => Rule::AllButOne,
        };

        Ok(Self {
            name: name.to_string(),
            rule,
        })
    }
}

/// Set members ordered by source path, then mail id.
fn ordered<'a>(set: &'a DuplicateSet) -> Vec<&'a Mail> {
    let mut mails: Vec<&Mail> = set.mails().iter().collect();
    mails.sort_by(|a, b| {
        a.source_path()
            .cmp(b.source_path())
            .then_with(|| a.mail_id().cmp(b.mail_id()))
    });
    mails
}

impl SelectionStrategy for Strategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn choose<'a>(&self, set: &'a DuplicateSet) -> Vec<&'a Mail> {
        let pick = |keep: &dyn Fn(&Mail) -> bool| -> Vec<&'a Mail> {
            set.mails().iter().filter(|mail| keep(mail)).collect()
        };

        match &self.rule {
            Rule::Older => pick(&|m| m.timestamp() < set.newest_timestamp()),
            Rule::Oldest => pick(&|m| m.timestamp() == set.oldest_timestamp()),
            Rule::Newer => pick(&|m| m.timestamp() > set.oldest_timestamp()),
            Rule::Newest => pick(&|m| m.timestamp() == set.newest_timestamp()),
            Rule::Smaller => pick(&|m| m.size() < set.biggest_size()),
            Rule::Smallest => pick(&|m| m.size() == set.smallest_size()),
            Rule::Bigger => pick(&|m| m.size() > set.smallest_size()),
            Rule::Biggest => pick(&|m| m.size() == set.biggest_size()),
            Rule::MatchingPath(re) => pick(&|m| re.is_match(&m.path().to_string_lossy())),
            Rule::NonMatchingPath(re) => pick(&|m| !re.is_match(&m.path().to_string_lossy())),
            Rule::One => ordered(set).into_iter().take(1).collect(),
            Rule::AllButOne => ordered(set).into_iter().skip(1).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::mail::MailId;
    use crate::mailbox::RawMail;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, UNIX_EPOCH};

    fn mail(source: &str, id: &str, date: &str, body: &str) -> Mail {
        let bytes = format!(
            "Date: {date}\nFrom: a@example.com\nTo: b@example.com\nSubject: s\n\
             Message-ID: <m@example.com>\n\n{body}"
        );
        Mail::parse(
            Path::new(source),
            MailId::from(id),
            RawMail {
                bytes: bytes.into_bytes(),
                path: PathBuf::from(format!("{source}/{id}")),
                modified: Some(UNIX_EPOCH + Duration::from_secs(1)),
            },
            &AppConfig::default(),
        )
    }

    fn sample_set() -> DuplicateSet {
        DuplicateSet::new(
            "key".to_string(),
            vec![
                mail("/b", "1", "Tue, 1 Jun 2021 10:00:00 +0000", "short\n"),
                mail("/a", "2", "Wed, 2 Jun 2021 10:00:00 +0000", "a longer body\n"),
                mail("/a", "1", "Thu, 3 Jun 2021 10:00:00 +0000", "the longest body of all\n"),
            ],
            &AppConfig::default(),
        )
    }

    fn chosen(name: &str, regexp: Option<&str>) -> Vec<String> {
        let set = sample_set();
        let strategy = Strategy::resolve(name, regexp).unwrap();
        strategy
            .choose(&set)
            .into_iter()
            .map(|m| m.mail_ref().to_string())
            .collect()
    }

    #[test]
    fn test_time_strategies() {
        assert_eq!(chosen("select-older", None), vec!["/b:1", "/a:2"]);
        assert_eq!(chosen("select-oldest", None), vec!["/b:1"]);
        assert_eq!(chosen("select-newer", None), vec!["/a:2", "/a:1"]);
        assert_eq!(chosen("select-newest", None), vec!["/a:1"]);
    }

    #[test]
    fn test_size_strategies() {
        assert_eq!(chosen("select-smaller", None), vec!["/b:1", "/a:2"]);
        assert_eq!(chosen("select-smallest", None), vec!["/b:1"]);
        assert_eq!(chosen("select-bigger", None), vec!["/a:2", "/a:1"]);
        assert_eq!(chosen("select-biggest", None), vec!["/a:1"]);
    }

    #[test]
    fn test_aliases_select_the_complement() {
        assert_eq!(chosen("discard-newest", None), chosen("select-older", None));
        assert_eq!(chosen("discard-smallest", None), chosen("select-bigger", None));
        assert_eq!(chosen("discard-one", None), vec!["/a:2", "/b:1"]);
        assert_eq!(chosen("discard-all-but-one", None), vec!["/a:1"]);
    }

    #[test]
    fn test_path_strategies() {
        assert_eq!(chosen("select-matching-path", Some("^/a/")), vec!["/a:2", "/a:1"]);
        assert_eq!(chosen("select-non-matching-path", Some("^/a/")), vec!["/b:1"]);
        assert!(matches!(
            Strategy::resolve("select-matching-path", None),
            Err(Error::MissingRegexp(_))
        ));
        assert!(matches!(
            Strategy::resolve("select-matching-path", Some("(")),
            Err(Error::Regex(_))
        ));
    }

    #[test]
    fn test_unknown_strategy() {
        assert!(matches!(
            Strategy::resolve("select-random", None),
            Err(Error::UnknownStrategy(_))
        ));
        assert!(lookup("discard-older").is_some());
        assert_eq!(STRATEGIES.len() + ALIASES.len(), 24);
    }
}
