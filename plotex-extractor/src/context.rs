//! Run context
//!
//! Everything a run needs that does not change while it runs: the names taken
//! from the command line, values derived from configuration, and the trait
//! schema. Built once, then passed by reference.

use plotex_common::config::{CsvConfig, ExtractorConfig};
use plotex_common::time::local_datetime;
use std::collections::HashSet;

use crate::error::{ExtractorError, ExtractorResult};
use crate::services::trait_schema::{TraitLiterals, TraitSchema, FIXED_FIELDS};

const PATH_UNSAFE_CHARS: &str = " :;.,/\\'\"(){}";
const PLOT_SIGNATURE: &str = "by plot";
const PLOT_SEPARATOR: &str = " - ";

/// Immutable per-run state
#[derive(Debug, Clone)]
pub struct RunContext {
    pub extractor_name: String,
    pub sensor_name: String,
    pub variable_names: Vec<String>,
    pub schema: TraitSchema,
    pub germplasm: String,
    pub experiment: String,
    pub plot_name: String,
    /// Site-local datetime written to every row
    pub local_datetime: String,
    pub write_csv: bool,
    pub write_betydb: bool,
    pub first_image_only: bool,
    pub csv: CsvConfig,
}

impl RunContext {
    pub fn new(
        config: &ExtractorConfig,
        germplasm: &str,
        experiment: &str,
        timestamp: &str,
        plot: &str,
    ) -> ExtractorResult<Self> {
        let sensor_name = sensor_name(&config.extractor_name);
        if sensor_name.is_empty() {
            return Err(ExtractorError::Config(
                "extractor_name must be set to a non-empty value".to_string(),
            ));
        }

        let variable_names = config.variable_names.names();
        validate_variable_names(&variable_names)?;

        let schema = TraitSchema::new(&variable_names, &TraitLiterals::from_config(config));

        Ok(Self {
            extractor_name: config.extractor_name.trim().to_string(),
            sensor_name,
            variable_names,
            schema,
            germplasm: germplasm.to_string(),
            experiment: experiment.to_string(),
            plot_name: plot_name_from_label(plot),
            local_datetime: local_datetime(timestamp),
            write_csv: !config.never_write_csv,
            write_betydb: !config.never_write_betydb,
            first_image_only: config.first_image_only,
            csv: config.csv.clone(),
        })
    }

    /// `<sanitized experiment>_<sensor>` (CSV and sidecar file stem)
    pub fn output_stem(&self) -> String {
        format!("{}_{}", str_to_path(&self.experiment), self.sensor_name)
    }
}

fn validate_variable_names(names: &[String]) -> ExtractorResult<()> {
    if names.is_empty() {
        return Err(ExtractorError::Config(
            "variable_names must name at least one field".to_string(),
        ));
    }

    let mut seen: HashSet<&str> = FIXED_FIELDS.iter().copied().collect();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ExtractorError::Config(format!(
                "variable name '{}' is duplicated or collides with a fixed field",
                name
            )));
        }
    }
    Ok(())
}

/// Sensor name derived from an extractor name
///
/// Trimmed, whitespace characters replaced with `_`, lowercased.
pub fn sensor_name(extractor_name: &str) -> String {
    extractor_name
        .trim()
        .replace([' ', '\t', '\n', '\r'], "_")
        .to_lowercase()
}

/// Replace characters that are unsafe in file names with `_`
pub fn str_to_path(target: &str) -> String {
    target
        .chars()
        .map(|c| if PATH_UNSAFE_CHARS.contains(c) { '_' } else { c })
        .collect()
}

/// Plot name embedded in a "By Plot" label
///
/// `"Season 4 By Plot - Range 12 Column 3 - extra"` yields
/// `"Range 12 Column 3"`. Names without the label are returned unchanged.
pub fn plot_name_from_label(name: &str) -> String {
    // ASCII lowercasing keeps byte offsets valid for slicing `name`
    let low_name = name.to_ascii_lowercase();
    if !low_name.contains(PLOT_SIGNATURE) {
        return name.to_string();
    }

    let mut parts = low_name.split(PLOT_SEPARATOR);
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) => {
            let start = first.len() + PLOT_SEPARATOR.len();
            name[start..start + second.len()].to_string()
        }
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotex_common::config::VariableNames;

    fn config(extractor_name: &str, vars: &str) -> ExtractorConfig {
        ExtractorConfig {
            extractor_name: extractor_name.to_string(),
            variable_names: VariableNames::Joined(vars.to_string()),
            ..ExtractorConfig::default()
        }
    }

    #[test]
    fn test_sensor_name() {
        assert_eq!(sensor_name("  Canopy Cover\tRGB\n"), "canopy_cover_rgb");
        assert_eq!(sensor_name("greenness"), "greenness");
        assert_eq!(sensor_name("   "), "");
    }

    #[test]
    fn test_str_to_path() {
        assert_eq!(str_to_path("Exp 1: (S4) a.b,c/d\\e'f\"g{h};"), "Exp_1___S4__a_b_c_d_e_f_g_h__");
        assert_eq!(str_to_path("plain-name"), "plain-name");
    }

    #[test]
    fn test_plot_name_from_label() {
        assert_eq!(
            plot_name_from_label("MAC Season 4 By Plot - Range 12 Column 3 - extra"),
            "Range 12 Column 3"
        );
        assert_eq!(
            plot_name_from_label("Season BY PLOT - Plot_7"),
            "Plot_7"
        );
        // Label without a separator: unchanged
        assert_eq!(plot_name_from_label("by plot only"), "by plot only");
        assert_eq!(plot_name_from_label("Plot_12"), "Plot_12");
    }

    #[test]
    fn test_context_from_config() {
        let mut config = config("Canopy Cover", "canopy_cover, height");
        config.never_write_betydb = true;

        let ctx = RunContext::new(&config, "B73", "Exp 1", "2020-06-01", "Plot_12").unwrap();
        assert_eq!(ctx.sensor_name, "canopy_cover");
        assert_eq!(ctx.variable_names, vec!["canopy_cover", "height"]);
        assert_eq!(ctx.schema.fields().len(), 10);
        assert_eq!(ctx.local_datetime, "2020-06-01T12:00:00");
        assert!(ctx.write_csv);
        assert!(!ctx.write_betydb);
        assert!(ctx.first_image_only);
        assert_eq!(ctx.output_stem(), "Exp_1_canopy_cover");
    }

    #[test]
    fn test_empty_extractor_name_rejected() {
        let err = RunContext::new(&config(" ", "v"), "g", "e", "t", "p").unwrap_err();
        assert!(matches!(err, ExtractorError::Config(_)));
    }

    #[test]
    fn test_bad_variable_names_rejected() {
        for vars in ["", " , ", "a,a", "site"] {
            let err = RunContext::new(&config("x", vars), "g", "e", "t", "p").unwrap_err();
            assert!(matches!(err, ExtractorError::Config(_)), "accepted {:?}", vars);
        }
    }
}
