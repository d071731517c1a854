//! Data models for the carton hierarchy calculation.
//!
//! This module defines the structures flowing through the calculator:
//! - `CalcInput`: one immutable snapshot of the form parameters
//! - `WeightLevel` / `HierarchyWeights`: derived weights per packaging level
//! - `MasterDims`: master carton dimensions in centimeters
//!
//! All masses are carried in grams internally; kilogram input is converted
//! at the boundary.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::types::{Dimensional, Vec3};

/// Validation error for calculation parameters.
#[derive(Debug, Clone)]
pub enum ValidationError {
    InvalidDimension(String),
    InvalidWeight(String),
    InvalidCount(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidDimension(msg) => write!(f, "Invalid dimension: {}", msg),
            ValidationError::InvalidWeight(msg) => write!(f, "Invalid weight: {}", msg),
            ValidationError::InvalidCount(msg) => write!(f, "Invalid count: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Rejects non-finite or negative dimension values.
///
/// Zero is allowed: absent dimensions degrade to the fallback cube instead
/// of failing the request.
fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value.is_nan() || value.is_infinite() || value < 0.0 {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be a finite non-negative number, got: {}",
            name, value
        )));
    }
    Ok(())
}

/// Upper bound on user-entered counts.
///
/// Packing quantities live in the tens to low thousands; anything past this
/// limit is a typo and would only burn time in the divisor search.
pub const MAX_COUNT: u32 = 1_000_000;

/// Rejects counts past `MAX_COUNT`.
fn validate_count(value: u32, name: &str) -> Result<(), ValidationError> {
    if value > MAX_COUNT {
        return Err(ValidationError::InvalidCount(format!(
            "{} must not exceed {}, got: {}",
            name, MAX_COUNT, value
        )));
    }
    Ok(())
}

/// Rejects non-finite or negative weight values.
fn validate_weight_value(value: f64, name: &str) -> Result<(), ValidationError> {
    if value.is_nan() || value.is_infinite() || value < 0.0 {
        return Err(ValidationError::InvalidWeight(format!(
            "{} must be a finite non-negative number, got: {}",
            name, value
        )));
    }
    Ok(())
}

/// Which side of the weight equation the input value specifies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WeightMode {
    Net,
    Gross,
}

/// Mass unit of the input weight field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MassUnit {
    G,
    Kg,
}

impl MassUnit {
    /// Conversion factor into grams.
    pub fn grams_factor(&self) -> f64 {
        match self {
            MassUnit::G => 1.0,
            MassUnit::Kg => 1000.0,
        }
    }
}

impl Default for MassUnit {
    fn default() -> Self {
        MassUnit::G
    }
}

/// Master carton dimensions in centimeters (length, width, height).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema)]
pub struct MasterDims {
    #[schema(value_type = [f64; 3], example = json!([40.0, 30.0, 20.0]))]
    pub cm: (f64, f64, f64),
}

impl MasterDims {
    /// Creates master dimensions with validation.
    ///
    /// # Examples
    /// ```
    /// use cartonizer::model::MasterDims;
    ///
    /// let ok = MasterDims::new((40.0, 30.0, 20.0));
    /// assert!(ok.is_ok());
    ///
    /// let bad = MasterDims::new((-40.0, 30.0, 20.0));
    /// assert!(bad.is_err());
    /// ```
    pub fn new(cm: (f64, f64, f64)) -> Result<Self, ValidationError> {
        validate_dimension(cm.0, "Length")?;
        validate_dimension(cm.1, "Width")?;
        validate_dimension(cm.2, "Height")?;
        Ok(Self { cm })
    }

    /// Length in centimeters.
    #[inline]
    pub fn length(&self) -> f64 {
        self.cm.0
    }

    /// Width in centimeters.
    #[inline]
    pub fn width(&self) -> f64 {
        self.cm.1
    }

    /// Height in centimeters.
    #[inline]
    pub fn height(&self) -> f64 {
        self.cm.2
    }

    /// Volume in cubic meters (CBM).
    ///
    /// # Examples
    /// ```
    /// use cartonizer::model::MasterDims;
    ///
    /// let dims = MasterDims::new((40.0, 30.0, 20.0)).unwrap();
    /// assert!((dims.cbm() - 0.024).abs() < 1e-9);
    /// ```
    pub fn cbm(&self) -> f64 {
        self.volume() / 1_000_000.0
    }
}

impl Dimensional for MasterDims {
    fn dimensions(&self) -> Vec3 {
        Vec3::from_tuple(self.cm)
    }
}

/// One immutable snapshot of the calculator parameters.
///
/// # Fields
/// * `weight_mode` - Whether `unit_weight` is the net or the gross weight
/// * `unit_weight` - Weight of one unit, expressed in `weight_unit`
/// * `weight_unit` - Mass unit of `unit_weight` (grams or kilograms)
/// * `units_per_master` - Units packed into one master carton
/// * `master_tare_g` - Packaging tare of the master carton in grams
/// * `inners_per_master` - Inner cartons per master, `None` when disabled
/// * `dims` - Master carton dimensions, `None` when volume is not tracked
#[derive(Clone, Debug)]
pub struct CalcInput {
    pub weight_mode: WeightMode,
    pub unit_weight: f64,
    pub weight_unit: MassUnit,
    pub units_per_master: u32,
    pub master_tare_g: f64,
    pub inners_per_master: Option<u32>,
    pub dims: Option<MasterDims>,
}

impl CalcInput {
    /// Creates a validated input snapshot.
    ///
    /// Zero counts and zero weights are accepted: they degrade to the
    /// documented fallbacks instead of failing. Only values that cannot
    /// mean anything (NaN, infinite, negative) are rejected.
    pub fn new(
        weight_mode: WeightMode,
        unit_weight: f64,
        weight_unit: MassUnit,
        units_per_master: u32,
        master_tare_g: f64,
        inners_per_master: Option<u32>,
        dims: Option<MasterDims>,
    ) -> Result<Self, ValidationError> {
        validate_weight_value(unit_weight, "Unit weight")?;
        validate_weight_value(master_tare_g, "Master tare")?;
        validate_count(units_per_master, "Units per master")?;
        if let Some(inners) = inners_per_master {
            validate_count(inners, "Inner cartons per master")?;
        }
        Ok(Self {
            weight_mode,
            unit_weight,
            weight_unit,
            units_per_master,
            master_tare_g,
            inners_per_master,
            dims,
        })
    }

    /// Input weight converted to grams.
    #[inline]
    pub fn unit_weight_g(&self) -> f64 {
        self.unit_weight * self.weight_unit.grams_factor()
    }

    /// Effective unit count for the weight math.
    ///
    /// A zero or absent count behaves like a single unit, which keeps every
    /// division defined.
    #[inline]
    pub fn effective_units(&self) -> f64 {
        if self.units_per_master == 0 {
            1.0
        } else {
            f64::from(self.units_per_master)
        }
    }

    /// Inner carton count, zero when the inner level is disabled.
    #[inline]
    pub fn inner_count(&self) -> u32 {
        self.inners_per_master.unwrap_or(0)
    }

    /// Whether the inner packaging level participates in the hierarchy.
    #[inline]
    pub fn has_active_inner(&self) -> bool {
        self.inner_count() > 0
    }

    /// Units per inner carton, fractional when the division is not exact.
    pub fn units_per_inner(&self) -> f64 {
        if self.has_active_inner() {
            self.effective_units() / f64::from(self.inner_count())
        } else {
            0.0
        }
    }
}

/// Derived weights for one packaging level.
///
/// # Fields
/// * `net_g` - Net weight in grams
/// * `gross_g` - Gross weight in grams
/// * `pcs` - Units contained at this level (fractional for uneven inners)
/// * `cbm` - Volume in cubic meters, only present on the master level
#[derive(Clone, Copy, Debug, Serialize, ToSchema)]
pub struct WeightLevel {
    pub net_g: f64,
    pub gross_g: f64,
    pub pcs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cbm: Option<f64>,
}

/// The complete weight hierarchy: unit, optional inner, master.
#[derive(Clone, Copy, Debug, Serialize, ToSchema)]
pub struct HierarchyWeights {
    pub unit: WeightLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner: Option<WeightLevel>,
    pub master: WeightLevel,
}
