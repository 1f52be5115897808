/*!
   Gating of test behaviour on the release a chain image was built from.
*/

use semver::{BuildMetadata, Version};

const RELEASE_PREFIX: &str = "release-";

/// Substituted for an `x` in release line tags such as `release-v7.4.x`.
const WILDCARD_SENTINEL: &str = "999";

/**
   The releases a feature shipped in.

   `major_version` is the first major release where every version has the
   feature. `minor_versions` lists one floor per older major line where the
   feature was backported.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureReleases {
    pub major_version: Option<&'static str>,
    pub minor_versions: &'static [&'static str],
}

impl FeatureReleases {
    pub const fn new(major_version: &'static str, minor_versions: &'static [&'static str]) -> Self {
        Self {
            major_version: Some(major_version),
            minor_versions,
        }
    }

    /// A feature that only exists on backported minor lines.
    pub const fn minors_only(minor_versions: &'static [&'static str]) -> Self {
        Self {
            major_version: None,
            minor_versions,
        }
    }

    /**
       Returns true if the image tagged `tag` is expected to have the feature.

       Tags that are not semantic versions (`main`, `pr-155`, commit hashes)
       are assumed to be built from a branch that has every feature.
    */
    pub fn is_supported(&self, tag: &str) -> bool {
        let tag = match tag.strip_prefix(RELEASE_PREFIX) {
            Some(line) => line.replace('x', WILDCARD_SENTINEL),
            None => tag.to_owned(),
        };

        let Some(version) = parse_version(&tag) else {
            return true;
        };

        if let Some(major) = self.major_version.and_then(parse_version) {
            if version >= major {
                return true;
            }
        }

        // Only the first floor on the tag's major line counts, and only its major.minor.
        self.minor_versions
            .iter()
            .filter_map(|floor| parse_version(floor))
            .find(|floor| floor.major == version.major)
            .is_some_and(|floor| version >= Version::new(floor.major, floor.minor, 0))
    }
}

/**
   Parses a `v`-prefixed semantic version. The shorthands `vMAJOR` and
   `vMAJOR.MINOR` are accepted and padded with zeros. Build metadata is
   dropped so that it does not take part in comparisons.
*/
pub fn parse_version(tag: &str) -> Option<Version> {
    let raw = tag.strip_prefix('v')?;

    let (core, suffix) = match raw.find(['-', '+']) {
        Some(idx) => raw.split_at(idx),
        None => (raw, ""),
    };

    let padded = match core.split('.').count() {
        3 => core.to_owned(),
        2 if suffix.is_empty() => format!("{core}.0"),
        1 if suffix.is_empty() => format!("{core}.0.0"),
        _ => return None,
    };

    let mut version = Version::parse(&format!("{padded}{suffix}")).ok()?;
    version.build = BuildMetadata::EMPTY;

    Some(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKPORTED: FeatureReleases =
        FeatureReleases::new("v6.0.0", &["v2.5.0", "v3.4.0", "v4.2.0", "v5.1.0"]);

    #[test]
    fn test_non_semver_tags_are_supported() {
        for tag in ["main", "pr-155", "pr-123", "latest", "7.1.0", "abc123f", ""] {
            assert!(BACKPORTED.is_supported(tag), "{tag}");
        }
    }

    #[test]
    fn test_backported_floors() {
        assert!(BACKPORTED.is_supported("v2.5.0"));
        assert!(!BACKPORTED.is_supported("v2.4.0"));
        assert!(BACKPORTED.is_supported("v6.0.0"));
        assert!(!BACKPORTED.is_supported("v1.9.9"));
        assert!(BACKPORTED.is_supported("v3.4.1"));
        assert!(!BACKPORTED.is_supported("v4.1.9"));
        assert!(BACKPORTED.is_supported("v7.0.0"));
    }

    #[test]
    fn test_prerelease_below_floor() {
        assert!(!BACKPORTED.is_supported("v6.0.0-rc.0"));
        assert!(!BACKPORTED.is_supported("v6.0.0-rc.0+build.1"));
        assert!(BACKPORTED.is_supported("v6.0.1-rc.0"));
    }

    #[test]
    fn test_release_lines() {
        let feature = FeatureReleases::new("v8.0.0", &["v7.4.0"]);

        assert!(feature.is_supported("release-v7.4.x"));
        assert!(!feature.is_supported("release-v7.3.x"));
        assert!(feature.is_supported("release-v8.0.x"));
        assert!(!feature.is_supported("release-v6.2.x"));
    }

    #[test]
    fn test_shorthand_versions() {
        let feature = FeatureReleases::new("v8", &["v7.1"]);

        assert!(feature.is_supported("v8"));
        assert!(feature.is_supported("v7.1"));
        assert!(!feature.is_supported("v7.0"));
        assert!(!feature.is_supported("v7"));
    }

    #[test]
    fn test_minors_only() {
        let feature = FeatureReleases::minors_only(&["v7.2.0"]);

        assert!(feature.is_supported("v7.2.0"));
        assert!(!feature.is_supported("v8.0.0"));
        assert!(!feature.is_supported("v7.1.0"));
    }

    #[test]
    fn test_floor_patch_is_ignored() {
        let feature = FeatureReleases::new("v8.0.0", &["v7.4.3"]);

        assert!(feature.is_supported("v7.4.0"));
        assert!(feature.is_supported("v7.4.1"));
        assert!(!feature.is_supported("v7.3.9"));
        assert!(!feature.is_supported("release-v7.3.x"));
    }

    #[test]
    fn test_monotonic() {
        let versions = [
            "v1.0.0", "v2.0.0", "v2.4.9", "v2.5.0", "v2.6.0", "v3.3.0", "v3.4.0", "v4.0.0",
            "v4.2.0", "v5.0.0", "v5.1.0", "v6.0.0", "v6.1.0", "v10.0.0",
        ];

        for (i, lower) in versions.iter().enumerate() {
            for higher in &versions[i..] {
                let same_line = parse_version(lower).map(|v| v.major)
                    == parse_version(higher).map(|v| v.major);
                let above_major = parse_version(higher) >= parse_version("v6.0.0");
                if BACKPORTED.is_supported(lower) && (same_line || above_major) {
                    assert!(BACKPORTED.is_supported(higher), "{lower} -> {higher}");
                }
            }
        }
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("v1.2.3"), Version::parse("1.2.3").ok());
        assert_eq!(parse_version("v1.2"), Version::parse("1.2.0").ok());
        assert_eq!(parse_version("v1"), Version::parse("1.0.0").ok());
        assert_eq!(parse_version("v1.2.3-rc.1"), Version::parse("1.2.3-rc.1").ok());
        assert_eq!(parse_version("1.2.3"), None);
        assert_eq!(parse_version("v1.2-rc.1"), None);
        assert_eq!(parse_version("v1.2.3.4"), None);
        assert_eq!(parse_version("vx"), None);
    }
}
