use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::str::contains;

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(format!("{name}.tab")), body).unwrap();
}

/// Two periods, one day-ahead root with one intraday child. The intraday
/// price matches the spot price, so serving 10 units in both periods costs
/// 5·10 + 8·10 = 130 regardless of the market split.
fn write_case(dir: &Path) {
    write(dir, "Set_of_TimeSteps", "Time\n1\n2\n");
    write(dir, "Set_of_Nodes", "Node\nda1\nid1\n");
    write(dir, "Subset_Plan_Nodes", "Node\nda1\n");
    write(dir, "Subset_ID_Nodes", "Node\nid1\n");
    write(dir, "Subset_RT_Nodes", "Node\n");
    write(dir, "Set_parent_coupling", "Child\tParent\nid1\tda1\n");
    write(dir, "Set_of_Technology", "Technology\nPower_Grid\n");
    write(dir, "Set_of_EnergyCarrier", "Carrier\nElectricity\n");
    write(dir, "Set_Mode_of_Operation", "Mode\nm1\n");
    write(dir, "Set_of_FlexibleLoad", "Load\n");
    write(dir, "Subset_TechToEC", "Tech\tCarrier\tMode\nPower_Grid\tElectricity\tm1\n");
    write(
        dir,
        "Par_TechToEC_Efficiency",
        "Tech\tCarrier\tMode\tEff\nPower_Grid\tElectricity\tm1\t1.0\n",
    );
    write(dir, "Subset_ECToTech", "Tech\tCarrier\tMode\n");
    write(dir, "Par_ECToTech_Efficiency", "Tech\tCarrier\tMode\tEff\n");
    write(dir, "Set_of_FlexibleLoadForEC", "Load\tCarrier\n");
    write(dir, "Par_NodesProbability", "Node\tValue\nda1\t1.0\nid1\t1.0\n");
    write(dir, "Par_SpotPrice", "Node\tTime\tValue\nda1\t1\t5.0\nda1\t2\t8.0\n");
    write(dir, "Par_IntradayPrice", "Node\tTime\tValue\nid1\t1\t5.0\nid1\t2\t8.0\n");
    write(
        dir,
        "Par_EnergyDemand",
        "Node\tTime\tCarrier\tValue\nid1\t1\tElectricity\t10\nid1\t2\tElectricity\t10\n",
    );
}

#[test]
fn test_check_reports_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    write_case(dir.path());

    Command::cargo_bin("semp")
        .unwrap()
        .args(["check", "--data"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("nodes:       2"))
        .stdout(contains("variables:"))
        .stdout(contains("energy_balance:"));
}

#[test]
fn test_solve_writes_solution_json() {
    let dir = tempfile::tempdir().unwrap();
    write_case(dir.path());
    let out = dir.path().join("solution.json");

    Command::cargo_bin("semp")
        .unwrap()
        .args(["solve", "--data"])
        .arg(dir.path())
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let objective = report["objective"].as_f64().unwrap();
    assert!((objective - 130.0).abs() < 1e-2, "objective {objective}");
    assert!(report["variables"].as_object().unwrap().len() > 0);
}

#[test]
fn test_bad_case_fails_with_table_name() {
    let dir = tempfile::tempdir().unwrap();
    write_case(dir.path());
    fs::remove_file(dir.path().join("Par_NodesProbability.tab")).unwrap();

    Command::cargo_bin("semp")
        .unwrap()
        .args(["check", "--data"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("Par_NodesProbability"));
}
