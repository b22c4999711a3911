use std::path::Path;

use json::JsonValue;

use crate::{
    datatypes::{ModelMetadata, DEFAULT_POISSON_RATIO, DEFAULT_RIGHT_EDGE_X, DEFAULT_TRACTION_INTENSITY},
    error::{Result, TristressError},
};

/// Parses the input json into a JsonValue object
///
/// # Arguments
/// * `input_file` - The path to the input file
///
/// # Returns
/// A JsonValue object
pub fn load_input_file<P: AsRef<Path>>(input_file: P) -> Result<JsonValue> {
    let input_file = input_file.as_ref();
    let file_string = match std::fs::read_to_string(input_file) {
        Ok(f) => f,
        Err(err) => {
            return Err(TristressError::FileNotFound(format!(
                "{}: {err}",
                input_file.display()
            )))
        }
    };

    let input_file_json = match json::parse(&file_string) {
        Ok(f) => f,
        Err(err) => {
            return Err(TristressError::Input(format!(
                "Error in input file json: {err}"
            )))
        }
    };

    if !input_file_json.has_key("metadata") {
        return Err(TristressError::Input(
            "Input json missing metadata field".to_string(),
        ));
    }

    Ok(input_file_json)
}

/// Reads an optional number from the metadata section, rejecting values
/// of the wrong type
fn optional_f64(metadata: &JsonValue, key: &str) -> Result<Option<f64>> {
    if !metadata.has_key(key) {
        return Ok(None);
    }
    match metadata[key].as_f64() {
        Some(v) => Ok(Some(v)),
        None => Err(TristressError::Input(format!(
            "Bad value for {key} in metadata section: {}",
            metadata[key].dump()
        ))),
    }
}

/// Metadata values that may each be absent, as read from an input file or
/// given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialMetadata {
    pub poisson_ratio: Option<f64>,
    pub youngs_modulus: Option<f64>,
    pub right_edge_x: Option<f64>,
    pub traction_intensity: Option<f64>,
}

impl PartialMetadata {
    /// Replaces every value that `overrides` sets
    pub fn overridden_by(self, overrides: PartialMetadata) -> PartialMetadata {
        PartialMetadata {
            poisson_ratio: overrides.poisson_ratio.or(self.poisson_ratio),
            youngs_modulus: overrides.youngs_modulus.or(self.youngs_modulus),
            right_edge_x: overrides.right_edge_x.or(self.right_edge_x),
            traction_intensity: overrides.traction_intensity.or(self.traction_intensity),
        }
    }

    /// Fills defaults, requires Young's modulus and validates the result
    pub fn resolve(self) -> Result<ModelMetadata> {
        let youngs_modulus = match self.youngs_modulus {
            Some(e) => e,
            None => {
                return Err(TristressError::Input(
                    "material_elasticity is required: set it in the metadata section or pass --youngs-modulus"
                        .to_owned(),
                ))
            }
        };

        let model_metadata = ModelMetadata {
            youngs_modulus,
            poisson_ratio: self.poisson_ratio.unwrap_or(DEFAULT_POISSON_RATIO),
            right_edge_x: self.right_edge_x.unwrap_or(DEFAULT_RIGHT_EDGE_X),
            traction_intensity: self.traction_intensity.unwrap_or(DEFAULT_TRACTION_INTENSITY),
        };

        validate_metadata(&model_metadata)?;

        Ok(model_metadata)
    }
}

/// Reads whichever metadata fields the input json sets
///
/// # Arguments
/// * `input_json`: The input file as a JsonValue object
pub fn parse_partial_metadata(input_json: &JsonValue) -> Result<PartialMetadata> {
    let metadata = &input_json["metadata"];

    Ok(PartialMetadata {
        poisson_ratio: optional_f64(metadata, "poisson_ratio")?,
        youngs_modulus: optional_f64(metadata, "material_elasticity")?,
        right_edge_x: optional_f64(metadata, "right_edge_x")?,
        traction_intensity: optional_f64(metadata, "traction_intensity")?,
    })
}

/// Parses Model Metadata from the input_json
///
/// # Arguments
/// * `input_json`: The input file as a JsonValue object
///
/// # Returns
/// A validated ModelMetadata instance
pub fn parse_input_metadata(input_json: &JsonValue) -> Result<ModelMetadata> {
    parse_partial_metadata(input_json)?.resolve()
}

/// Reads the metadata fields an input file sets, without requiring any
pub fn load_partial_metadata<P: AsRef<Path>>(input_file: P) -> Result<PartialMetadata> {
    let input_json = load_input_file(input_file)?;
    parse_partial_metadata(&input_json)
}

/// Loads and validates model metadata from an input file
pub fn load_metadata<P: AsRef<Path>>(input_file: P) -> Result<ModelMetadata> {
    let metadata = load_partial_metadata(input_file)?.resolve()?;

    println!(
        "info: loaded metadata E = {}, nu = {}",
        metadata.youngs_modulus, metadata.poisson_ratio
    );

    Ok(metadata)
}

/// Checks that material and load parameters describe a solvable model
pub fn validate_metadata(metadata: &ModelMetadata) -> Result<()> {
    let values = [
        ("material_elasticity", metadata.youngs_modulus),
        ("poisson_ratio", metadata.poisson_ratio),
        ("right_edge_x", metadata.right_edge_x),
        ("traction_intensity", metadata.traction_intensity),
    ];
    for (name, value) in values {
        if !value.is_finite() {
            return Err(TristressError::Input(format!("{name} must be finite")));
        }
    }

    if metadata.youngs_modulus <= 0.0 {
        return Err(TristressError::Input(format!(
            "material_elasticity must be positive, got {}",
            metadata.youngs_modulus
        )));
    }
    if metadata.poisson_ratio <= -1.0 || metadata.poisson_ratio >= 0.5 {
        return Err(TristressError::Input(format!(
            "poisson_ratio must lie in (-1, 0.5), got {}",
            metadata.poisson_ratio
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn full_metadata() {
        let input = json::parse(
            r#"{"metadata": {"poisson_ratio": 0.25, "material_elasticity": 30e6,
                "right_edge_x": 2.0, "traction_intensity": 500}}"#,
        )
        .unwrap();

        let metadata = parse_input_metadata(&input).unwrap();
        assert_eq!(
            metadata,
            ModelMetadata {
                poisson_ratio: 0.25,
                youngs_modulus: 30e6,
                right_edge_x: 2.0,
                traction_intensity: 500.0,
            }
        );
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let input = json::parse(r#"{"metadata": {"material_elasticity": 2e11}}"#).unwrap();
        let metadata = parse_input_metadata(&input).unwrap();
        assert_eq!(metadata, ModelMetadata::new(DEFAULT_POISSON_RATIO, 2e11));
    }

    #[test]
    fn youngs_modulus_is_required() {
        let input = json::parse(r#"{"metadata": {"poisson_ratio": 0.3}}"#).unwrap();
        assert!(matches!(
            parse_input_metadata(&input),
            Err(TristressError::Input(_))
        ));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let input =
            json::parse(r#"{"metadata": {"material_elasticity": 2e11, "poisson_ratio": "low"}}"#)
                .unwrap();
        assert!(matches!(
            parse_input_metadata(&input),
            Err(TristressError::Input(_))
        ));
    }

    #[test]
    fn invalid_material() {
        assert!(validate_metadata(&ModelMetadata::new(0.5, 2e11)).is_err());
        assert!(validate_metadata(&ModelMetadata::new(0.3, 0.0)).is_err());
        assert!(validate_metadata(&ModelMetadata::new(0.3, f64::NAN)).is_err());
        assert!(validate_metadata(&ModelMetadata::new(0.3, 2e11)).is_ok());
    }

    #[test]
    fn input_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"metadata": {{"material_elasticity": 2000}}}}"#).unwrap();

        let metadata = load_metadata(file.path()).unwrap();
        assert_eq!(metadata.youngs_modulus, 2000.0);
    }

    #[test]
    fn overrides_supply_missing_modulus() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"metadata": {{"poisson_ratio": 0.25}}}}"#).unwrap();

        let from_file = load_partial_metadata(file.path()).unwrap();
        assert_eq!(from_file.youngs_modulus, None);

        let overrides = PartialMetadata {
            youngs_modulus: Some(2e11),
            ..Default::default()
        };
        let metadata = from_file.overridden_by(overrides).resolve().unwrap();
        assert_eq!(metadata, ModelMetadata::new(0.25, 2e11));
    }

    #[test]
    fn overrides_take_precedence() {
        let from_file = PartialMetadata {
            poisson_ratio: Some(0.2),
            youngs_modulus: Some(1000.0),
            right_edge_x: Some(3.0),
            traction_intensity: None,
        };
        let overrides = PartialMetadata {
            youngs_modulus: Some(5000.0),
            traction_intensity: Some(10.0),
            ..Default::default()
        };

        let merged = from_file.overridden_by(overrides);
        assert_eq!(
            merged,
            PartialMetadata {
                poisson_ratio: Some(0.2),
                youngs_modulus: Some(5000.0),
                right_edge_x: Some(3.0),
                traction_intensity: Some(10.0),
            }
        );
    }

    #[test]
    fn missing_metadata_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"boundary_conditions": {{}}}}"#).unwrap();

        assert!(matches!(
            load_input_file(file.path()),
            Err(TristressError::Input(_))
        ));
    }

    #[test]
    fn missing_input_file() {
        assert!(matches!(
            load_metadata("does/not/exist.json"),
            Err(TristressError::FileNotFound(_))
        ));
    }
}
