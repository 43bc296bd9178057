//! # semp-io: Planning-Table Import
//!
//! Populates a [`semp_core::Registry`] from a directory of tab-separated
//! tables, one file per set or parameter, using the same table names the
//! upstream workbook export produces. Sets are loaded before parameters so
//! every parameter key resolves against an interned entity; any unknown
//! name, duplicate key, arity mismatch or missing required table aborts the
//! load before model assembly begins.
//!
//! Parameter tables are optional unless structurally mandatory (conversion
//! efficiencies paired with their relation tables, storage efficiencies,
//! node probabilities): an absent optional table simply leaves the
//! parameter at its default.

use std::collections::HashMap;
use std::path::Path;

use semp_core::{Registry, RegistryBuilder, SempError, SempResult, Stage};

pub mod tables;

use tables::{parse_f64, parse_i64, read_table};

macro_rules! node_time_param {
    ($dir:expr, $rb:expr, $table:literal, $field:ident) => {{
        if let Some(table) = read_table($dir, $table, false)? {
            table.check_arity(3)?;
            let mut parsed = Vec::new();
            for row in &table.rows {
                let n = $rb.node(&row[0])?;
                let t = $rb.period_position(parse_i64($table, &row[1])?)?;
                let v = parse_f64($table, &row[2])?;
                parsed.push((n, t, v));
            }
            for (n, t, v) in parsed {
                if $rb.params.$field.insert((n, t), v).is_some() {
                    return Err(SempError::Data(format!(
                        "table '{}': duplicate entry for node {:?}, period {}",
                        $table, n, t
                    )));
                }
            }
        }
    }};
}

macro_rules! keyed_param {
    // 2-column tables keyed by a single entity.
    ($dir:expr, $rb:expr, $table:literal, $resolver:ident, $field:ident, $required:expr) => {{
        if let Some(table) = read_table($dir, $table, $required)? {
            table.check_arity(2)?;
            let mut parsed = Vec::new();
            for row in &table.rows {
                let key = $rb.$resolver(&row[0])?;
                let v = parse_f64($table, &row[1])?;
                parsed.push((key, row[0].clone(), v));
            }
            for (key, name, v) in parsed {
                if $rb.params.$field.insert(key, v).is_some() {
                    return Err(SempError::Data(format!(
                        "table '{}': duplicate entry for '{}'",
                        $table, name
                    )));
                }
            }
        }
    }};
}

macro_rules! scalar_param {
    ($dir:expr, $rb:expr, $table:literal, $field:ident) => {{
        if let Some(table) = read_table($dir, $table, false)? {
            $rb.params.$field = table.scalar()?;
        }
    }};
}

/// Load every planning table under `dir` into a validated [`Registry`].
pub fn load_registry(dir: &Path) -> SempResult<Registry> {
    let mut rb = RegistryBuilder::new();

    // ---- sets ---------------------------------------------------------

    let time = read_table(dir, "Set_of_TimeSteps", true)?.expect("required");
    time.check_arity(1)?;
    for row in &time.rows {
        rb.add_period(parse_i64("Set_of_TimeSteps", &row[0])?)?;
    }

    let nodes = read_table(dir, "Set_of_Nodes", true)?.expect("required");
    nodes.check_arity(1)?;
    for row in &nodes.rows {
        rb.add_node(&row[0])?;
    }

    for (table, stage) in [
        ("Subset_Plan_Nodes", Stage::DayAhead),
        ("Subset_ID_Nodes", Stage::Intraday),
        ("Subset_RT_Nodes", Stage::RealTime),
    ] {
        let subset = read_table(dir, table, true)?.expect("required");
        subset.check_arity(1)?;
        for row in &subset.rows {
            let n = rb.node(&row[0])?;
            rb.set_stage(n, stage)?;
        }
    }

    let parents = read_table(dir, "Set_parent_coupling", true)?.expect("required");
    parents.check_arity(2)?;
    for row in &parents.rows {
        let child = rb.node(&row[0])?;
        let parent = rb.node(&row[1])?;
        rb.add_parent_link(child, parent);
    }

    let techs = read_table(dir, "Set_of_Technology", true)?.expect("required");
    techs.check_arity(1)?;
    for row in &techs.rows {
        rb.add_technology(&row[0])?;
    }

    let carriers = read_table(dir, "Set_of_EnergyCarrier", true)?.expect("required");
    carriers.check_arity(1)?;
    for row in &carriers.rows {
        rb.add_carrier(&row[0])?;
    }

    let modes = read_table(dir, "Set_Mode_of_Operation", true)?.expect("required");
    modes.check_arity(1)?;
    for row in &modes.rows {
        rb.add_mode(&row[0])?;
    }

    let loads = read_table(dir, "Set_of_FlexibleLoad", true)?.expect("required");
    loads.check_arity(1)?;
    for row in &loads.rows {
        rb.add_flexible_load(&row[0])?;
    }
    let have_loads = !loads.rows.is_empty();

    // ---- conversion relations (set + mandatory efficiency join) -------

    load_conversions(dir, &mut rb, "Subset_TechToEC", "Par_TechToEC_Efficiency", true)?;
    load_conversions(dir, &mut rb, "Subset_ECToTech", "Par_ECToTech_Efficiency", false)?;

    // ---- flexible-load relations --------------------------------------

    let pairs = read_table(dir, "Set_of_FlexibleLoadForEC", true)?.expect("required");
    pairs.check_arity(2)?;
    for row in &pairs.rows {
        let b = rb.flexible_load(&row[0])?;
        let e = rb.carrier(&row[1])?;
        rb.add_load_carrier(b, e)?;
    }

    if let Some(shiftable) = read_table(dir, "Subset_ShiftableLoadForEC", false)? {
        shiftable.check_arity(2)?;
        for row in &shiftable.rows {
            let b = rb.flexible_load(&row[0])?;
            let e = rb.carrier(&row[1])?;
            rb.mark_shiftable(b, e)?;
        }
    }

    // ---- months and load-shifting windows -----------------------------

    if let Some(months) = read_table(dir, "Set_of_Month", false)? {
        months.check_arity(1)?;
        for row in &months.rows {
            rb.add_month(&row[0])?;
        }
        let in_month = read_table(dir, "Subset_of_TimeStepsInMonth", true)?.expect("required");
        in_month.check_arity(2)?;
        for row in &in_month.rows {
            let m = rb.month(&row[0])?;
            rb.add_time_in_month(m, parse_i64("Subset_of_TimeStepsInMonth", &row[1])?)?;
        }
    }

    if let Some(intervals) = read_table(dir, "Set_of_LoadShiftingInterval", false)? {
        intervals.check_arity(1)?;
        for row in &intervals.rows {
            rb.add_shift_interval(&row[0])?;
        }
        let window = read_table(dir, "Subset_LoadShiftWindow", true)?.expect("required");
        window.check_arity(2)?;
        for row in &window.rows {
            let iv = rb.shift_interval(&row[0])?;
            rb.add_shift_step(iv, parse_i64("Subset_LoadShiftWindow", &row[1])?)?;
        }
    }

    if let Some(excess) = read_table(dir, "Subset_ExcessHeatTech", false)? {
        excess.check_arity(3)?;
        for row in &excess.rows {
            let i = rb.technology(&row[0])?;
            let e = rb.carrier(&row[1])?;
            let o = rb.mode(&row[2])?;
            rb.add_excess_heat_rule(i, e, o);
        }
    }

    // ---- (node, time) market parameters -------------------------------

    node_time_param!(dir, rb, "Par_SpotPrice", spot_price);
    node_time_param!(dir, rb, "Par_IntradayPrice", intraday_price);
    node_time_param!(dir, rb, "Par_RK_UpPrice", rk_up_price);
    node_time_param!(dir, rb, "Par_RK_DwnPrice", rk_dwn_price);
    node_time_param!(dir, rb, "Par_aFRR_UP_CAP_price", afrr_up_cap_price);
    node_time_param!(dir, rb, "Par_aFRR_DWN_CAP_price", afrr_dwn_cap_price);
    node_time_param!(dir, rb, "Par_aFRR_UP_ACT_price", afrr_up_act_price);
    node_time_param!(dir, rb, "Par_aFRR_DWN_ACT_price", afrr_dwn_act_price);
    node_time_param!(dir, rb, "Par_ActivationFactor_Up_Reg", activation_up);
    node_time_param!(dir, rb, "Par_ActivationFactor_Dwn_Reg", activation_dwn);

    // ---- indexed cost/demand parameters -------------------------------

    if let Some(table) = read_table(dir, "Par_EnergyCost", false)? {
        table.check_arity(4)?;
        for row in &table.rows {
            let n = rb.node(&row[0])?;
            let t = rb.period_position(parse_i64("Par_EnergyCost", &row[1])?)?;
            let i = rb.technology(&row[2])?;
            let v = parse_f64("Par_EnergyCost", &row[3])?;
            if rb.params.energy_cost.insert((n, t, i), v).is_some() {
                return Err(SempError::Data(format!(
                    "table 'Par_EnergyCost': duplicate entry for ({}, {}, {})",
                    row[0], row[1], row[2]
                )));
            }
        }
    }

    if let Some(table) = read_table(dir, "Par_AvailabilityFactor", false)? {
        table.check_arity(4)?;
        for row in &table.rows {
            let n = rb.node(&row[0])?;
            let t = rb.period_position(parse_i64("Par_AvailabilityFactor", &row[1])?)?;
            let i = rb.technology(&row[2])?;
            let v = parse_f64("Par_AvailabilityFactor", &row[3])?;
            if rb.params.availability.insert((n, t, i), v).is_some() {
                return Err(SempError::Data(format!(
                    "table 'Par_AvailabilityFactor': duplicate entry for ({}, {}, {})",
                    row[0], row[1], row[2]
                )));
            }
        }
    }

    for (name, is_demand) in [("Par_ExportCost", false), ("Par_EnergyDemand", true)] {
        if let Some(table) = read_table(dir, name, false)? {
            table.check_arity(4)?;
            for row in &table.rows {
                let n = rb.node(&row[0])?;
                let t = rb.period_position(parse_i64(name, &row[1])?)?;
                let e = rb.carrier(&row[2])?;
                let v = parse_f64(name, &row[3])?;
                let target = if is_demand {
                    &mut rb.params.demand
                } else {
                    &mut rb.params.export_price
                };
                if target.insert((n, t, e), v).is_some() {
                    return Err(SempError::Data(format!(
                        "table '{}': duplicate entry for ({}, {}, {})",
                        name, row[0], row[1], row[2]
                    )));
                }
            }
        }
    }

    if let Some(table) = read_table(dir, "Par_CarbonIntensity", false)? {
        table.check_arity(3)?;
        for row in &table.rows {
            let i = rb.technology(&row[0])?;
            let o = rb.mode(&row[1])?;
            let v = parse_f64("Par_CarbonIntensity", &row[2])?;
            if rb.params.carbon_intensity.insert((i, o), v).is_some() {
                return Err(SempError::Data(format!(
                    "table 'Par_CarbonIntensity': duplicate entry for ({}, {})",
                    row[0], row[1]
                )));
            }
        }
    }

    // ---- per-entity parameters ----------------------------------------

    keyed_param!(dir, rb, "Par_InitialCapacityInstalled", technology, installed_capacity, false);
    keyed_param!(dir, rb, "Par_Ramping_factor", technology, ramping_factor, false);
    keyed_param!(dir, rb, "Par_CostExpansion_Tec", technology, tech_expansion_cost, false);
    keyed_param!(dir, rb, "Par_Max_CAPEX_tec", technology, tech_capex_cap, false);

    keyed_param!(dir, rb, "Par_ChargeEfficiency", flexible_load, charge_efficiency, have_loads);
    keyed_param!(dir, rb, "Par_DischargeEfficiency", flexible_load, discharge_efficiency, have_loads);
    keyed_param!(dir, rb, "Par_MaxChargeDischargeRate", flexible_load, max_rate, false);
    keyed_param!(dir, rb, "Par_MaxStorageCapacity", flexible_load, max_storage, false);
    keyed_param!(dir, rb, "Par_SelfDischarge", flexible_load, self_discharge, false);
    keyed_param!(dir, rb, "Par_InitialSoC", flexible_load, initial_soc, false);
    keyed_param!(dir, rb, "Par_Energy2Power_ratio", flexible_load, energy_to_power, false);
    keyed_param!(dir, rb, "Par_BatteryCost", flexible_load, storage_cost, false);
    keyed_param!(dir, rb, "Par_CostExpansion_Bat", flexible_load, storage_expansion_cost, false);
    keyed_param!(dir, rb, "Par_Max_CAPEX_bat", flexible_load, storage_capex_cap, false);

    keyed_param!(dir, rb, "Par_NodesProbability", node, probability, true);

    // ---- scalars ------------------------------------------------------

    scalar_param!(dir, rb, "Par_CostEmission", carbon_price);
    scalar_param!(dir, rb, "Par_CostGridTariff", grid_tariff);
    scalar_param!(dir, rb, "Par_CostImbalance", imbalance_cost);
    scalar_param!(dir, rb, "Par_MaxExport", max_export);
    scalar_param!(dir, rb, "Par_MaxUpShift", up_shift_max);
    scalar_param!(dir, rb, "Par_MaxDwnShift", down_shift_max);
    scalar_param!(dir, rb, "Par_AvailableExcessHeat", excess_heat_fraction);
    if let Some(table) = read_table(dir, "Par_Max_Carbon_Emission", false)? {
        rb.params.max_emission = Some(table.scalar()?);
    }

    rb.finish()
}

/// Join a conversion-relation set table with its efficiency table. Every
/// declared triple must have exactly one efficiency; stray efficiency rows
/// for undeclared triples are rejected rather than silently dropped.
fn load_conversions(
    dir: &Path,
    rb: &mut RegistryBuilder,
    set_table: &str,
    eff_table: &str,
    out: bool,
) -> SempResult<()> {
    let set = read_table(dir, set_table, true)?.expect("required");
    set.check_arity(3)?;
    let eff = read_table(dir, eff_table, true)?.expect("required");
    eff.check_arity(4)?;

    let mut efficiencies: HashMap<(String, String, String), f64> = HashMap::new();
    for row in &eff.rows {
        let key = (row[0].clone(), row[1].clone(), row[2].clone());
        let v = parse_f64(eff_table, &row[3])?;
        if efficiencies.insert(key, v).is_some() {
            return Err(SempError::Data(format!(
                "table '{}': duplicate efficiency for ({}, {}, {})",
                eff_table, row[0], row[1], row[2]
            )));
        }
    }

    for row in &set.rows {
        let i = rb.technology(&row[0])?;
        let e = rb.carrier(&row[1])?;
        let o = rb.mode(&row[2])?;
        let key = (row[0].clone(), row[1].clone(), row[2].clone());
        let efficiency = efficiencies.remove(&key).ok_or_else(|| {
            SempError::Data(format!(
                "table '{}': missing efficiency for declared relation ({}, {}, {})",
                eff_table, row[0], row[1], row[2]
            ))
        })?;
        if out {
            rb.add_conversion_out(i, e, o, efficiency)?;
        } else {
            rb.add_conversion_in(i, e, o, efficiency)?;
        }
    }

    if let Some(((i, e, o), _)) = efficiencies.iter().next() {
        return Err(SempError::Data(format!(
            "table '{eff_table}': efficiency given for undeclared relation ({i}, {e}, {o})"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use semp_core::{ELECTRICITY, GRID_TECHNOLOGY};
    use std::fs;
    use std::path::PathBuf;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(format!("{name}.tab")), body).unwrap();
    }

    /// Two periods, one day-ahead root with one intraday child, grid import
    /// plus a battery.
    fn write_case(dir: &Path) -> PathBuf {
        write(dir, "Set_of_TimeSteps", "Time\n1\n2\n");
        write(dir, "Set_of_Nodes", "Node\nda1\nid1\n");
        write(dir, "Subset_Plan_Nodes", "Node\nda1\n");
        write(dir, "Subset_ID_Nodes", "Node\nid1\n");
        write(dir, "Subset_RT_Nodes", "Node\n");
        write(dir, "Set_parent_coupling", "Child\tParent\nid1\tda1\n");
        write(dir, "Set_of_Technology", "Technology\nPower_Grid\n");
        write(dir, "Set_of_EnergyCarrier", "Carrier\nElectricity\n");
        write(dir, "Set_Mode_of_Operation", "Mode\nm1\n");
        write(dir, "Set_of_FlexibleLoad", "Load\nBattery\n");
        write(dir, "Subset_TechToEC", "Tech\tCarrier\tMode\nPower_Grid\tElectricity\tm1\n");
        write(
            dir,
            "Par_TechToEC_Efficiency",
            "Tech\tCarrier\tMode\tEff\nPower_Grid\tElectricity\tm1\t1.0\n",
        );
        write(dir, "Subset_ECToTech", "Tech\tCarrier\tMode\n");
        write(dir, "Par_ECToTech_Efficiency", "Tech\tCarrier\tMode\tEff\n");
        write(dir, "Set_of_FlexibleLoadForEC", "Load\tCarrier\nBattery\tElectricity\n");
        write(dir, "Par_ChargeEfficiency", "Load\tValue\nBattery\t0.95\n");
        write(dir, "Par_DischargeEfficiency", "Load\tValue\nBattery\t0.9\n");
        write(dir, "Par_NodesProbability", "Node\tValue\nda1\t1.0\nid1\t1.0\n");
        write(dir, "Par_SpotPrice", "Node\tTime\tValue\nda1\t1\t5.0\nda1\t2\t8.0\n");
        write(
            dir,
            "Par_EnergyDemand",
            "Node\tTime\tCarrier\tValue\nid1\t1\tElectricity\t10\nid1\t2\tElectricity\t10\n",
        );
        write(dir, "Par_CostGridTariff", "Value\n32.5\n");
        dir.to_path_buf()
    }

    #[test]
    fn test_load_complete_case() {
        let dir = tempfile::tempdir().unwrap();
        write_case(dir.path());

        let reg = load_registry(dir.path()).unwrap();
        assert_eq!(reg.num_periods(), 2);
        assert_eq!(reg.num_nodes(), 2);
        assert_eq!(reg.conversions_out().len(), 1);
        assert!(reg.grid_tech().is_some());

        let da = reg.nodes().next().unwrap();
        assert_eq!(reg.spot_price(da, 1), 8.0);
        let elec = reg.electricity().unwrap();
        let id = semp_core::NodeId::new(1);
        assert_eq!(reg.demand(id, 0, elec), 10.0);
        assert_eq!(reg.grid_tariff(), 32.5);
        // Optional table left at default.
        assert_eq!(reg.imbalance_cost(), 0.0);
        assert_eq!(reg.tech_name(reg.grid_tech().unwrap()), GRID_TECHNOLOGY);
        assert_eq!(reg.carrier_name(elec), ELECTRICITY);
    }

    #[test]
    fn test_missing_required_table() {
        let dir = tempfile::tempdir().unwrap();
        write_case(dir.path());
        fs::remove_file(dir.path().join("Set_parent_coupling.tab")).unwrap();
        let err = load_registry(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Set_parent_coupling"));
    }

    #[test]
    fn test_duplicate_param_key() {
        let dir = tempfile::tempdir().unwrap();
        write_case(dir.path());
        write(
            dir.path(),
            "Par_SpotPrice",
            "Node\tTime\tValue\nda1\t1\t5.0\nda1\t1\t6.0\n",
        );
        let err = load_registry(dir.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_missing_efficiency_for_relation() {
        let dir = tempfile::tempdir().unwrap();
        write_case(dir.path());
        write(dir.path(), "Par_TechToEC_Efficiency", "Tech\tCarrier\tMode\tEff\n");
        let err = load_registry(dir.path()).unwrap_err();
        assert!(err.to_string().contains("missing efficiency"));
    }

    #[test]
    fn test_unknown_entity_in_param() {
        let dir = tempfile::tempdir().unwrap();
        write_case(dir.path());
        write(dir.path(), "Par_SpotPrice", "Node\tTime\tValue\nnope\t1\t5.0\n");
        let err = load_registry(dir.path()).unwrap_err();
        assert!(err.to_string().contains("unknown node"));
    }

    #[test]
    fn test_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_case(dir.path());
        write(dir.path(), "Par_SpotPrice", "Node\tTime\tValue\nda1\t1\n");
        let err = load_registry(dir.path()).unwrap_err();
        assert!(err.to_string().contains("expected 3 columns"));
    }
}
