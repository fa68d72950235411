// src/data/region.rs
//
// The crash dataset writes regions as "<Name> Region" while the population
// dataset and the config use the bare "<Name>". All translation between the
// two lives here.

const REGION_SUFFIX: &str = "Region";

/// `"Auckland"` -> `"Auckland Region"`
pub fn crash_region_label(region: &str) -> String {
    format!("{} {}", region, REGION_SUFFIX)
}

/// `"Auckland Region"` -> `Some("Auckland")`; anything without the suffix -> `None`.
pub fn plain_region_name(label: &str) -> Option<&str> {
    label
        .strip_suffix(REGION_SUFFIX)
        .and_then(|s| s.strip_suffix(' '))
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_appends_space_and_suffix() {
        assert_eq!(crash_region_label("Auckland"), "Auckland Region");
        assert_eq!(crash_region_label("Manawatu-Whanganui"), "Manawatu-Whanganui Region");
    }

    #[test]
    fn label_is_not_idempotent() {
        // Names are taken literally; callers must pass the plain form.
        assert_eq!(crash_region_label("Otago Region"), "Otago Region Region");
    }

    #[test]
    fn plain_name_round_trips() {
        assert_eq!(plain_region_name(&crash_region_label("Waikato")), Some("Waikato"));
        assert_eq!(plain_region_name("Waikato"), None);
        assert_eq!(plain_region_name("Region"), None);
        assert_eq!(plain_region_name("WaikatoRegion"), None);
    }
}
