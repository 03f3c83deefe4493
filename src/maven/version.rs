use std::cmp::Ordering;

/// Version representation supporting various formats
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub original: String,
    pub parsed: VersionType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionType {
    Semantic(semver::Version),
    Numeric(Vec<u64>),
    Unknown(String),
}

impl Version {
    pub fn parse(version: &str) -> Self {
        let parsed = if let Ok(v) = semver::Version::parse(version) {
            VersionType::Semantic(v)
        } else if let Some(numeric) = Self::parse_numeric(version) {
            VersionType::Numeric(numeric)
        } else {
            VersionType::Unknown(version.to_string())
        };

        Version {
            original: version.to_string(),
            parsed,
        }
    }

    fn parse_numeric(version: &str) -> Option<Vec<u64>> {
        let numbers: Option<Vec<u64>> = version
            .split(['.', '-', '_'])
            .map(|part| part.parse::<u64>().ok())
            .collect();

        numbers.filter(|n| !n.is_empty())
    }

    /// Pre-release builds always carry a letter somewhere (alpha, beta, RC,
    /// M1, SNAPSHOT, ...); a release is made of digits and separators only.
    pub fn is_stable(&self) -> bool {
        is_stable(&self.original)
    }
}

pub fn is_stable(version: &str) -> bool {
    !version.chars().any(char::is_alphabetic)
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.parsed, &other.parsed) {
            (VersionType::Semantic(a), VersionType::Semantic(b)) => a.cmp(b),
            (VersionType::Semantic(a), VersionType::Numeric(b)) => {
                compare_numeric(&[a.major, a.minor, a.patch], b)
            }
            (VersionType::Numeric(a), VersionType::Semantic(b)) => {
                compare_numeric(a, &[b.major, b.minor, b.patch])
            }
            (VersionType::Numeric(a), VersionType::Numeric(b)) => compare_numeric(a, b),
            (VersionType::Unknown(_), VersionType::Unknown(_)) => {
                self.original.cmp(&other.original)
            }
            (VersionType::Unknown(_), _) => Ordering::Less,
            (_, VersionType::Unknown(_)) => Ordering::Greater,
        }
    }
}

fn compare_numeric(a: &[u64], b: &[u64]) -> Ordering {
    for (av, bv) in a.iter().zip(b.iter()) {
        match av.cmp(bv) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

pub struct VersionComparator;

impl VersionComparator {
    /// First stable candidate in the order the registry returned them.
    pub fn first_stable<S: AsRef<str>>(candidates: &[S]) -> Option<&str> {
        candidates
            .iter()
            .map(|candidate| candidate.as_ref())
            .find(|candidate| is_stable(candidate))
    }

    /// Check if version `a` is newer than version `b`
    pub fn is_newer(a: &str, b: &str) -> bool {
        let va = Version::parse(a);
        let vb = Version::parse(b);
        va > vb
    }
}
