//! Weight and volume derivation across the packaging hierarchy.
//!
//! Pure functions over the model types: one input snapshot in, one weight
//! hierarchy out. All arithmetic happens in grams; the inner level is only
//! present when inner cartons are enabled with a non-zero count.

use crate::model::{CalcInput, HierarchyWeights, WeightLevel, WeightMode};

/// Derives net and gross weights for every active packaging level.
///
/// In net mode the master gross is the summed net plus tare and the unit
/// gross is the master gross spread back over the units; in gross mode the
/// direction reverses and the master net is clamped at zero when the tare
/// exceeds the total.
///
/// # Parameters
/// * `input` - Validated calculation parameters
///
/// # Returns
/// `HierarchyWeights` with the unit and master levels always present and
/// the inner level only when active.
pub fn resolve_weights(input: &CalcInput) -> HierarchyWeights {
    let value_g = input.unit_weight_g();
    let units = input.effective_units();
    let tare = input.master_tare_g;

    let (unit_net, unit_gross, master_net, master_gross) = match input.weight_mode {
        WeightMode::Net => {
            let unit_net = value_g;
            let master_net = unit_net * units;
            let master_gross = master_net + tare;
            let unit_gross = master_gross / units;
            (unit_net, unit_gross, master_net, master_gross)
        }
        WeightMode::Gross => {
            let unit_gross = value_g;
            let master_gross = unit_gross * units;
            let master_net = (master_gross - tare).max(0.0);
            let unit_net = master_net / units;
            (unit_net, unit_gross, master_net, master_gross)
        }
    };

    let inner = if input.has_active_inner() {
        let pcs = input.units_per_inner();
        Some(WeightLevel {
            net_g: unit_net * pcs,
            gross_g: unit_gross * pcs,
            pcs,
            cbm: None,
        })
    } else {
        None
    };

    HierarchyWeights {
        unit: WeightLevel {
            net_g: unit_net,
            gross_g: unit_gross,
            pcs: 1.0,
            cbm: None,
        },
        inner,
        master: WeightLevel {
            net_g: master_net,
            gross_g: master_gross,
            pcs: units,
            cbm: input.dims.map(|d| d.cbm()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MassUnit, MasterDims};

    const EPS: f64 = 1e-6;

    fn input(
        mode: WeightMode,
        weight: f64,
        unit: MassUnit,
        units: u32,
        tare: f64,
        inners: Option<u32>,
        dims: Option<(f64, f64, f64)>,
    ) -> CalcInput {
        CalcInput::new(
            mode,
            weight,
            unit,
            units,
            tare,
            inners,
            dims.map(|d| MasterDims::new(d).unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn net_mode_reference_scenario() {
        // 500 g net per unit, 24 units, 2 kg tare
        let result = resolve_weights(&input(
            WeightMode::Net,
            500.0,
            MassUnit::G,
            24,
            2000.0,
            None,
            None,
        ));

        assert!((result.master.net_g - 12_000.0).abs() < EPS);
        assert!((result.master.gross_g - 14_000.0).abs() < EPS);
        assert!((result.unit.net_g - 500.0).abs() < EPS);
        assert!((result.unit.gross_g - 14_000.0 / 24.0).abs() < EPS);
        assert!((result.unit.gross_g - 583.3333).abs() < 1e-3);
        assert!((result.master.pcs - 24.0).abs() < EPS);
        assert!(result.inner.is_none());
    }

    #[test]
    fn gross_mode_inverts_derivation() {
        let result = resolve_weights(&input(
            WeightMode::Gross,
            600.0,
            MassUnit::G,
            10,
            1000.0,
            None,
            None,
        ));

        assert!((result.master.gross_g - 6000.0).abs() < EPS);
        assert!((result.master.net_g - 5000.0).abs() < EPS);
        assert!((result.unit.net_g - 500.0).abs() < EPS);
        assert!((result.unit.gross_g - 600.0).abs() < EPS);
    }

    #[test]
    fn gross_mode_clamps_net_at_zero() {
        // Tare heavier than everything the carton holds
        let result = resolve_weights(&input(
            WeightMode::Gross,
            10.0,
            MassUnit::G,
            5,
            2000.0,
            None,
            None,
        ));

        assert!((result.master.net_g - 0.0).abs() < EPS);
        assert!((result.unit.net_g - 0.0).abs() < EPS);
        assert!((result.master.gross_g - 50.0).abs() < EPS);
    }

    #[test]
    fn kilogram_input_is_converted() {
        let result = resolve_weights(&input(
            WeightMode::Net,
            0.5,
            MassUnit::Kg,
            24,
            2000.0,
            None,
            None,
        ));

        assert!((result.master.net_g - 12_000.0).abs() < EPS);
        assert!((result.master.gross_g - 14_000.0).abs() < EPS);
    }

    #[test]
    fn inner_level_spreads_unit_weights() {
        let result = resolve_weights(&input(
            WeightMode::Net,
            500.0,
            MassUnit::G,
            24,
            2000.0,
            Some(4),
            None,
        ));

        let inner = result.inner.expect("inner level missing");
        assert!((inner.pcs - 6.0).abs() < EPS);
        assert!((inner.net_g - 3000.0).abs() < EPS);
        assert!((inner.gross_g - 6.0 * result.unit.gross_g).abs() < EPS);
    }

    #[test]
    fn uneven_inner_division_keeps_fraction_for_weights() {
        let result = resolve_weights(&input(
            WeightMode::Net,
            100.0,
            MassUnit::G,
            24,
            0.0,
            Some(5),
            None,
        ));

        let inner = result.inner.expect("inner level missing");
        assert!((inner.pcs - 4.8).abs() < EPS);
        assert!((inner.net_g - 480.0).abs() < EPS);
    }

    #[test]
    fn zero_inner_count_disables_level() {
        let result = resolve_weights(&input(
            WeightMode::Net,
            100.0,
            MassUnit::G,
            24,
            0.0,
            Some(0),
            None,
        ));
        assert!(result.inner.is_none());
    }

    #[test]
    fn zero_units_degrade_to_single_unit() {
        let result = resolve_weights(&input(
            WeightMode::Net,
            500.0,
            MassUnit::G,
            0,
            100.0,
            None,
            None,
        ));

        assert!((result.master.net_g - 500.0).abs() < EPS);
        assert!((result.master.gross_g - 600.0).abs() < EPS);
        assert!((result.unit.gross_g - 600.0).abs() < EPS);
    }

    #[test]
    fn cbm_present_only_with_dims() {
        let without = resolve_weights(&input(
            WeightMode::Net,
            500.0,
            MassUnit::G,
            24,
            0.0,
            None,
            None,
        ));
        assert!(without.master.cbm.is_none());

        let with = resolve_weights(&input(
            WeightMode::Net,
            500.0,
            MassUnit::G,
            24,
            0.0,
            None,
            Some((40.0, 30.0, 20.0)),
        ));
        assert!((with.master.cbm.unwrap() - 0.024).abs() < 1e-9);
    }
}
