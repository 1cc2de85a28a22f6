use std::path::Path;
use std::process::{Command, Output};

const NETWORKING: &str = r#"
name = "networking"
region = "eu-west-2"
availability_zones = ["eu-west-2a", "eu-west-2b", "eu-west-2c"]

[tags]
AutoOff = "False"

[[networks]]
name = "educate-app"
cidr_block = "172.255.0.0/16"
az_count = 3

[[networks]]
name = "educate-db"
cidr_block = "172.254.0.0/16"
rds_network = true

[[peerings]]
source = "educate-app"
destination = "educate-db"
"#;

const DATABASES: &str = r#"
name = "databases"
region = "eu-west-2"
availability_zones = ["eu-west-2a", "eu-west-2b"]

[[databases]]
instance_name = "educate-sql-db"
prevent_delete = false
take_final_snapshot = false
allowed_cidrs = ["172.255.0.0/16"]
vpc_id = { stack = "networking", output = "educate-db.vpc_id" }
subnet_group_name = { stack = "networking", output = "educate-db.db_subnet_group_name" }
"#;

const APPLICATIONS: &str = r#"
name = "applications"
region = "eu-west-2"
availability_zones = ["eu-west-2a", "eu-west-2b", "eu-west-2c"]

[[databases]]
instance_name = "educate-ds"
cluster = true
engine = "aurora-mysql"
engine_version = "5.7.mysql_aurora.2.07.2"
instance_class = "db.t3.medium"
prevent_delete = false
take_final_snapshot = false
vpc_id = { stack = "networking", output = "educate-db.vpc_id" }
subnet_group_name = { stack = "networking", output = "educate-db.db_subnet_group_name" }

[[applications]]
name = "educate"
prevent_delete = false
certificate_arn = "arn:aws:acm:eu-west-2:000000000000:certificate/964f24fa-cc5b-45be-a741-1e468f4b259b"
vpc_id = { stack = "networking", output = "educate-app.vpc_id" }
public_subnet_ids = { stack = "networking", output = "educate-app.public_subnet_ids" }
private_subnet_ids = { stack = "networking", output = "educate-app.private_subnet_ids" }
"#;

fn vela(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vela"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run vela")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn assert_ok(output: &Output) {
    assert!(
        output.status.success(),
        "stdout:\n{}\nstderr:\n{}",
        stdout(output),
        stderr(output)
    );
}

fn read_state(dir: &Path, stack: &str) -> serde_json::Value {
    let content =
        std::fs::read_to_string(dir.join(".vela").join(format!("{}.state.json", stack))).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn networking_then_databases_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("networking.toml"), NETWORKING).unwrap();
    std::fs::write(dir.path().join("databases.toml"), DATABASES).unwrap();

    let output = vela(dir.path(), &["validate", "networking.toml"]);
    assert_ok(&output);
    assert!(stdout(&output).contains("Configuration is valid."));

    // Databases cannot be planned before the network they live in exists
    let output = vela(dir.path(), &["plan", "databases.toml"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("networking"));

    let output = vela(dir.path(), &["apply", "networking.toml"]);
    assert_ok(&output);
    assert!(stdout(&output).contains("Apply complete!"));
    assert!(!dir.path().join(".vela").join("networking.lock").exists());

    let state = read_state(dir.path(), "networking");
    let vpc_id = state["outputs"]["educate-db.vpc_id"].as_str().unwrap();
    assert!(vpc_id.starts_with("vpc-"));
    assert_eq!(
        state["outputs"]["educate-db.db_subnet_group_name"],
        "educate-db-db-subnet-group"
    );
    let subnets = state["outputs"]["educate-app.public_subnet_ids"]
        .as_array()
        .unwrap();
    assert_eq!(subnets.len(), 3);

    let output = vela(dir.path(), &["plan", "networking.toml"]);
    assert_ok(&output);
    assert!(stdout(&output).contains("No changes"));

    let output = vela(dir.path(), &["output", "educate-db.vpc_id", "-f", "networking.toml"]);
    assert_ok(&output);
    assert_eq!(stdout(&output).trim(), format!("\"{}\"", vpc_id));

    let output = vela(dir.path(), &["apply", "databases.toml"]);
    assert_ok(&output);

    let state = read_state(dir.path(), "databases");
    let sg = state["resources"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["resource_type"] == "security_group")
        .unwrap();
    assert_eq!(sg["attributes"]["vpc_id"], vpc_id);
    assert!(
        state["outputs"]["educate-sql-db.endpoint"]
            .as_str()
            .unwrap()
            .starts_with("educate-sql-db")
    );

    let output = vela(dir.path(), &["plan", "databases.toml"]);
    assert_ok(&output);
    assert!(stdout(&output).contains("No changes"));

    for stack in ["databases.toml", "networking.toml"] {
        let output = vela(dir.path(), &["destroy", stack, "--auto-approve"]);
        assert_ok(&output);
        assert!(stdout(&output).contains("Destroy complete!"));
    }

    let state = read_state(dir.path(), "networking");
    assert!(state["resources"].as_array().unwrap().is_empty());
    assert!(state["outputs"].as_object().unwrap().is_empty());
    assert_eq!(state["serial"], 2);

    let output = vela(dir.path(), &["destroy", "networking.toml", "--auto-approve"]);
    assert_ok(&output);
    assert!(stdout(&output).contains("No resources to destroy."));
}

fn resource<'a>(state: &'a serde_json::Value, resource_type: &str, name: &str) -> &'a serde_json::Value {
    state["resources"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["resource_type"] == resource_type && r["name"] == name)
        .unwrap_or_else(|| panic!("{}.{} not recorded", resource_type, name))
}

#[test]
fn application_and_cluster_are_placed_into_networking() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("networking.toml"), NETWORKING).unwrap();
    std::fs::write(dir.path().join("applications.toml"), APPLICATIONS).unwrap();

    assert_ok(&vela(dir.path(), &["apply", "networking.toml"]));
    let networking = read_state(dir.path(), "networking");
    let private_subnets = networking["outputs"]["educate-app.private_subnet_ids"]
        .as_array()
        .unwrap();

    let output = vela(dir.path(), &["apply", "applications.toml"]);
    assert_ok(&output);

    let state = read_state(dir.path(), "applications");
    let instance = resource(&state, "instance", "educate-instance");
    assert_eq!(instance["attributes"]["subnet_id"], private_subnets[0]);
    assert_eq!(instance["attributes"]["root_block_device"]["encrypted"], true);
    assert!(
        instance["attributes"]["iam_instance_profile"]
            .as_str()
            .unwrap()
            .starts_with("educate-profile")
    );

    let alb = resource(&state, "load_balancer", "educate-alb");
    assert_eq!(alb["attributes"]["subnets"], networking["outputs"]["educate-app.public_subnet_ids"]);
    let https = resource(&state, "listener", "educate-https-listener");
    assert_eq!(
        https["attributes"]["load_balancer_arn"],
        alb["attributes"]["arn"]
    );

    let writer = resource(&state, "rds_cluster_instance", "educate-ds-aurora-mysql-instance-0");
    assert_eq!(writer["attributes"]["cluster_identifier"], "educate-ds");
    assert!(
        state["outputs"]["educate-ds.endpoint"]
            .as_str()
            .unwrap()
            .starts_with("educate-ds.cluster-local.")
    );
    assert!(
        state["outputs"]["educate.load_balancer_dns_name"]
            .as_str()
            .unwrap()
            .ends_with(".eu-west-2.elb.amazonaws.com")
    );

    let output = vela(dir.path(), &["plan", "applications.toml"]);
    assert_ok(&output);
    assert!(stdout(&output).contains("No changes"));

    let output = vela(dir.path(), &["destroy", "applications.toml", "--auto-approve"]);
    assert_ok(&output);
    assert!(stdout(&output).contains("Destroy complete!"));
}

#[test]
fn held_lock_blocks_apply_until_forced_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("stack.toml"), NETWORKING).unwrap();
    std::fs::create_dir_all(dir.path().join(".vela")).unwrap();
    std::fs::write(
        dir.path().join(".vela").join("networking.lock"),
        r#"{
  "id": "stale-lock",
  "operation": "apply",
  "who": "ci@runner",
  "created": "2099-01-01T00:00:00Z",
  "expires": "2099-01-01T00:15:00Z"
}"#,
    )
    .unwrap();

    let output = vela(dir.path(), &["apply"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("ci@runner"));

    let output = vela(dir.path(), &["force-unlock", "stale-lock"]);
    assert_ok(&output);

    let output = vela(dir.path(), &["apply"]);
    assert_ok(&output);
}

#[test]
fn invalid_topology_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("stack.toml"),
        r#"
name = "networking"
region = "eu-west-2"
availability_zones = ["eu-west-2a"]

[[networks]]
name = "educate-app"
cidr_block = "172.255.0.0/16"
az_count = 2
"#,
    )
    .unwrap();

    let output = vela(dir.path(), &["validate"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Error:"));
    assert!(!dir.path().join(".vela").exists());
}
