//! The `prism filters` command.

use prism_core::{Config, FILTER_NAMES};

/// One-line description of a built-in filter.
fn describe(name: &str, config: &Config) -> String {
    match name {
        "null" => "store the image unchanged".to_string(),
        "grayscale" => "convert to 8-bit grayscale".to_string(),
        "invert" => "invert every color channel".to_string(),
        "blur" => format!("gaussian blur (sigma {})", config.filters.blur_sigma),
        "thumbnail" => format!(
            "resize so the longest edge is {}px",
            config.filters.thumbnail_size
        ),
        _ => String::new(),
    }
}

/// List filters, marking the ones enabled in the config.
pub fn execute(config: &Config) -> anyhow::Result<()> {
    for name in FILTER_NAMES {
        let marker = if config.filters.enabled.iter().any(|e| e == name) {
            "*"
        } else {
            " "
        };
        println!("{marker} {name:<10} {}", describe(name, config));
    }
    println!();
    println!("* enabled in {}", Config::default_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_filter_has_description() {
        let config = Config::default();
        for name in FILTER_NAMES {
            assert!(!describe(name, &config).is_empty(), "{name} has no description");
        }
    }

    #[test]
    fn test_descriptions_reflect_config() {
        let mut config = Config::default();
        config.filters.thumbnail_size = 99;
        assert!(describe("thumbnail", &config).contains("99px"));
    }
}
