//! Declared backend module requirements.
//!
//! # Responsibility
//! - Record which backend modules a feature module expects, with version ranges.
//! - Compare the declaration against an installed-version map on request.
//!
//! # Invariants
//! - Requirements are advisory; nothing here blocks a manifest build.
//! - Ranges are stored as declared, including ones that do not parse.
//! - Module names are unique within one declaration.

use log::{debug, warn};
use semver::{Version, VersionReq};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from declaring backend requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendRequirementError {
    /// Module name is blank.
    EmptyName,
    /// Module declared twice.
    DuplicateModule(String),
}

impl Display for BackendRequirementError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "backend module name cannot be empty"),
            Self::DuplicateModule(module) => {
                write!(f, "backend module already required: {module}")
            }
        }
    }
}

impl Error for BackendRequirementError {}

/// A version range as declared, in npm range syntax.
///
/// `||` separates alternatives and whitespace separates comparators that
/// must all hold (`">=2.2.0 <3.0.0 || ^4"`). Hyphen ranges (`1.2.0 - 2.0.0`)
/// and bare versions (`1.2.x`) keep their npm meaning. A range that cannot be
/// read is kept verbatim and reported by `BackendRequirements::advisories`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    alternatives: Option<Vec<VersionReq>>,
}

impl VersionRange {
    pub fn parse(raw: &str) -> Self {
        let alternatives = raw
            .split("||")
            .map(parse_alternative)
            .collect::<Result<Vec<_>, _>>()
            .ok();
        Self {
            raw: raw.trim().to_string(),
            alternatives,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_parseable(&self) -> bool {
        self.alternatives.is_some()
    }

    /// `None` when the range itself is unparseable.
    pub fn matches(&self, version: &Version) -> Option<bool> {
        self.alternatives
            .as_ref()
            .map(|alternatives| alternatives.iter().any(|req| req.matches(version)))
    }
}

impl Display for VersionRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Rewrites one npm comparator set into `VersionReq` syntax and parses it.
fn parse_alternative(alternative: &str) -> Result<VersionReq, semver::Error> {
    let tokens: Vec<&str> = alternative
        .split_whitespace()
        .map(|token| token.trim_end_matches(','))
        .filter(|token| !token.is_empty())
        .collect();

    let comparators = match tokens.as_slice() {
        [] => return Ok(VersionReq::STAR),
        [low, "-", high] => vec![format!(">={}", bare(low)), format!("<={}", bare(high))],
        _ => {
            let mut comparators = Vec::with_capacity(tokens.len());
            let mut pending_op: Option<&str> = None;
            for token in tokens {
                if token.chars().all(|ch| "<>=~^".contains(ch)) {
                    pending_op = Some(token);
                    continue;
                }
                let comparator = match pending_op.take() {
                    Some(op) => format!("{op}{}", bare(token)),
                    None if token.starts_with(|ch: char| ch.is_ascii_digit() || ch == 'v') => {
                        format!("={}", bare(token))
                    }
                    None => token.to_string(),
                };
                comparators.push(comparator);
            }
            comparators.extend(pending_op.map(str::to_string));
            comparators
        }
    };
    VersionReq::parse(&comparators.join(", "))
}

fn bare(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

/// One backend module and the versions it must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequirement {
    pub module: String,
    pub range: VersionRange,
}

/// Result of comparing one requirement with what is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendAdvisory {
    Missing {
        module: String,
        required: VersionRange,
    },
    Unsatisfied {
        module: String,
        required: VersionRange,
        installed: Version,
    },
    UnparseableVersion {
        module: String,
        installed: String,
    },
    /// The declared range could not be read, so the installed version was not checked.
    UnparseableRange {
        module: String,
        range: String,
    },
}

impl BackendAdvisory {
    pub fn module(&self) -> &str {
        match self {
            Self::Missing { module, .. }
            | Self::Unsatisfied { module, .. }
            | Self::UnparseableVersion { module, .. }
            | Self::UnparseableRange { module, .. } => module,
        }
    }
}

impl Display for BackendAdvisory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing { module, required } => {
                write!(f, "backend module `{module}` ({required}) is not installed")
            }
            Self::Unsatisfied {
                module,
                required,
                installed,
            } => write!(
                f,
                "backend module `{module}` {installed} does not satisfy {required}"
            ),
            Self::UnparseableVersion { module, installed } => write!(
                f,
                "backend module `{module}` reports unparseable version `{installed}`"
            ),
            Self::UnparseableRange { module, range } => write!(
                f,
                "backend module `{module}` declares unparseable range `{range}`"
            ),
        }
    }
}

/// Backend module name -> required version range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendRequirements {
    modules: BTreeMap<String, VersionRange>,
}

impl BackendRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that backend `module` must satisfy `range`.
    ///
    /// An unreadable `range` is still recorded; see [`VersionRange`].
    pub fn require(
        &mut self,
        module: impl Into<String>,
        range: &str,
    ) -> Result<(), BackendRequirementError> {
        let module = module.into().trim().to_string();
        if module.is_empty() {
            return Err(BackendRequirementError::EmptyName);
        }
        if self.modules.contains_key(&module) {
            return Err(BackendRequirementError::DuplicateModule(module));
        }

        let range = VersionRange::parse(range);
        if range.is_parseable() {
            debug!(
                "event=backend_require module=backend status=ok backend={} range={}",
                module, range
            );
        } else {
            warn!(
                "event=backend_require module=backend status=warn backend={} range={} error=unparseable_range",
                module, range
            );
        }
        self.modules.insert(module, range);
        Ok(())
    }

    /// Requirements in module-name order.
    pub fn requirements(&self) -> impl Iterator<Item = BackendRequirement> + '_ {
        self.modules.iter().map(|(module, range)| BackendRequirement {
            module: module.clone(),
            range: range.clone(),
        })
    }

    pub fn get(&self, module: &str) -> Option<&VersionRange> {
        self.modules.get(module)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Compares the declaration with `installed` (module name -> version).
    ///
    /// Returns one advisory per unmet requirement, in module-name order.
    /// A missing module is reported as missing even when its range is unreadable.
    /// Installed modules that were never required are ignored.
    pub fn advisories(&self, installed: &BTreeMap<String, String>) -> Vec<BackendAdvisory> {
        let advisories: Vec<BackendAdvisory> = self
            .modules
            .iter()
            .filter_map(|(module, required)| {
                let Some(raw) = installed.get(module) else {
                    return Some(BackendAdvisory::Missing {
                        module: module.clone(),
                        required: required.clone(),
                    });
                };
                match Version::parse(raw.trim()) {
                    Ok(version) => match required.matches(&version) {
                        Some(true) => None,
                        Some(false) => Some(BackendAdvisory::Unsatisfied {
                            module: module.clone(),
                            required: required.clone(),
                            installed: version,
                        }),
                        None => Some(BackendAdvisory::UnparseableRange {
                            module: module.clone(),
                            range: required.as_str().to_string(),
                        }),
                    },
                    Err(_) => Some(BackendAdvisory::UnparseableVersion {
                        module: module.clone(),
                        installed: raw.clone(),
                    }),
                }
            })
            .collect();

        for advisory in &advisories {
            warn!(
                "event=backend_advisory module=backend status=warn backend={} detail={}",
                advisory.module(),
                advisory
            );
        }
        advisories
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendAdvisory, BackendRequirementError, BackendRequirements, VersionRange};
    use semver::Version;
    use std::collections::BTreeMap;

    fn installed(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(name, version)| (name.to_string(), version.to_string()))
            .collect()
    }

    #[test]
    fn require_rejects_blank_and_duplicate_names() {
        let mut requirements = BackendRequirements::new();
        assert_eq!(
            requirements.require("  ", "^1.0"),
            Err(BackendRequirementError::EmptyName)
        );

        requirements
            .require("webservices.rest", "^2.24.0")
            .expect("valid range");
        assert_eq!(
            requirements.require("webservices.rest", "^2.25.0"),
            Err(BackendRequirementError::DuplicateModule(
                "webservices.rest".to_string()
            ))
        );
        requirements
            .require("fhir2", "not a range")
            .expect("unreadable ranges are kept");
        assert_eq!(requirements.len(), 2);
        assert!(!requirements.get("fhir2").expect("fhir2").is_parseable());
    }

    #[test]
    fn npm_ranges_are_understood() {
        let matches = |range: &str, version: &str| {
            VersionRange::parse(range).matches(&Version::parse(version).expect("version"))
        };

        assert_eq!(matches(">=2.2.0 <3.0.0", "2.9.1"), Some(true));
        assert_eq!(matches(">=2.2.0 <3.0.0", "3.0.0"), Some(false));
        assert_eq!(matches("^1.0.0 || ^2.0.0", "2.4.0"), Some(true));
        assert_eq!(matches("^1.0.0 || ^2.0.0", "3.0.0"), Some(false));
        assert_eq!(matches(">= 1.2.0 < 2", "1.5.0"), Some(true));
        assert_eq!(matches("1.2.0 - 1.4.0", "1.4.0"), Some(true));
        assert_eq!(matches("1.2.0 - 1.4.0", "1.4.1"), Some(false));
        assert_eq!(matches("1.2.3", "1.2.4"), Some(false));
        assert_eq!(matches("2.x", "2.7.0"), Some(true));
        assert_eq!(matches("*", "0.1.0"), Some(true));
        assert_eq!(matches("", "0.1.0"), Some(true));
        assert_eq!(matches("one point two", "1.2.0"), None);
        assert_eq!(VersionRange::parse(" ^2.24.0 ").as_str(), "^2.24.0");
    }

    #[test]
    fn requirements_iterate_in_name_order() {
        let mut requirements = BackendRequirements::new();
        requirements.require("webservices.rest", "^2.24.0").expect("rest");
        requirements.require("fhir2", ">=1.2").expect("fhir2");

        let names: Vec<String> = requirements
            .requirements()
            .map(|requirement| requirement.module)
            .collect();
        assert_eq!(names, vec!["fhir2", "webservices.rest"]);
    }

    #[test]
    fn advisories_report_missing_unsatisfied_and_unparseable_modules() {
        let mut requirements = BackendRequirements::new();
        requirements.require("fhir2", ">=1.2").expect("fhir2");
        requirements.require("idgen", "^4.0.0").expect("idgen");
        requirements.require("reporting", "^1.0").expect("reporting");
        requirements.require("webservices.rest", "^2.24.0").expect("rest");

        let advisories = requirements.advisories(&installed(&[
            ("fhir2", "1.10.0"),
            ("idgen", "3.2.1"),
            ("webservices.rest", "2.x-snapshot"),
            ("unrelated", "9.9.9"),
        ]));

        assert_eq!(advisories.len(), 3);
        assert!(matches!(
            &advisories[0],
            BackendAdvisory::Unsatisfied { module, .. } if module == "idgen"
        ));
        assert!(matches!(
            &advisories[1],
            BackendAdvisory::Missing { module, .. } if module == "reporting"
        ));
        assert!(matches!(
            &advisories[2],
            BackendAdvisory::UnparseableVersion { module, .. } if module == "webservices.rest"
        ));
    }

    #[test]
    fn unparseable_range_is_an_advisory_not_an_error() {
        let mut requirements = BackendRequirements::new();
        requirements.require("fhir2", "one point two").expect("kept");
        requirements.require("idgen", "latest").expect("kept");

        let advisories = requirements.advisories(&installed(&[("fhir2", "1.2.0")]));
        assert_eq!(
            advisories,
            vec![
                BackendAdvisory::UnparseableRange {
                    module: "fhir2".to_string(),
                    range: "one point two".to_string(),
                },
                BackendAdvisory::Missing {
                    module: "idgen".to_string(),
                    required: VersionRange::parse("latest"),
                },
            ]
        );
    }

    #[test]
    fn satisfied_requirements_produce_no_advisories() {
        let mut requirements = BackendRequirements::new();
        requirements.require("fhir2", "^1.2").expect("fhir2");
        assert!(requirements
            .advisories(&installed(&[("fhir2", "1.4.0")]))
            .is_empty());
    }
}
