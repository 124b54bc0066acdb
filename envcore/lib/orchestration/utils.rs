use chrono::{DateTime, Local};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Generates a container id from an environment name and a timestamp.
///
/// The id has the form `{name}-{HHMMSSmmm}`. Whitespace in the name becomes `-`. If `is_taken`
/// reports the id as used, a numeric suffix is appended until a free id is found.
pub fn generate_container_id(
    name: &str,
    now: DateTime<Local>,
    is_taken: impl Fn(&str) -> bool,
) -> String {
    let slug = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    let base = format!("{}-{}", slug, now.format("%H%M%S%3f"));

    if !is_taken(&base) {
        return base;
    }

    let mut suffix = 2;
    loop {
        let id = format!("{}-{}", base, suffix);
        if !is_taken(&id) {
            return id;
        }
        suffix += 1;
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_generate_container_id_format() {
        let now = Local
            .with_ymd_and_hms(2024, 5, 1, 9, 30, 15)
            .single()
            .expect("valid time");

        assert_eq!(
            generate_container_id("Web Dev", now, |_| false),
            "web-dev-093015000"
        );
    }

    #[test]
    fn test_generate_container_id_avoids_collisions() {
        let now = Local
            .with_ymd_and_hms(2024, 5, 1, 9, 30, 15)
            .single()
            .expect("valid time");
        let taken = ["dev-093015000", "dev-093015000-2"];

        assert_eq!(
            generate_container_id("dev", now, |id| taken.contains(&id)),
            "dev-093015000-3"
        );
    }
}
