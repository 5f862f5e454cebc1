//! A minimal repository layout: recipe, one manifest already applied, a task definition.

use std::fs;
use std::path::Path;

pub const REGISTRY: &str = "123456789012.dkr.ecr.ap-northeast-1.amazonaws.com";

pub const RECIPE: &str = r#"FROM apache/nifi:1.25.0

USER root

# Download PostgreSQL JDBC Driver
RUN curl -L "https://jdbc.postgresql.org/download/postgresql-42.7.1.jar" \
        -o /opt/nifi/nifi-current/lib/postgresql-42.7.1.jar && \
        chown 1000:1000 /opt/nifi/nifi-current/lib/postgresql-42.7.1.jar

# ============================================================
# NEW JARS WILL BE ADDED AUTOMATICALLY ABOVE THIS LINE
# ============================================================

# Revert to NiFi user
USER 1000
"#;

pub const POSTGRES_MANIFEST: &str = r#"{
  "name": "postgresql-42.7.1.jar",
  "url": "https://jdbc.postgresql.org/download/postgresql-42.7.1.jar",
  "install_path": "/opt/nifi/nifi-current/lib/",
  "description": "PostgreSQL JDBC Driver"
}
"#;

pub const MYSQL_MANIFEST: &str = r#"{
  "name": "mysql-connector-j-9.5.0.jar",
  "url": "https://repo1.maven.org/maven2/com/mysql/mysql-connector-j/9.5.0/mysql-connector-j-9.5.0.jar",
  "install_path": "/opt/nifi/nifi-current/lib/",
  "description": "MySQL JDBC Driver",
  "requested_by": "data-platform",
  "reason": "New CDC source"
}
"#;

pub const TASK_DEFINITION: &str = r#"resource "aws_ecs_task_definition" "nifi" {
  family                   = "nifi"
  requires_compatibilities = ["FARGATE"]
  network_mode             = "awsvpc"
  cpu                      = 2048
  memory                   = 4096

  container_definitions = jsonencode([
    {
      name      = "nifi"
      image     = "123456789012.dkr.ecr.ap-northeast-1.amazonaws.com/apache-nifi-with-custom-jars-repo:latest"
      essential = true
      portMappings = [
        { containerPort = 8443, protocol = "tcp" }
      ]
    }
  ])
}
"#;

/// Write the default layout under `root`: `custom_nifi/Dockerfile`,
/// `custom_nifi/jars/postgresql.json` and `ecs_task_definition.tf`.
pub fn write_repo(root: &Path) {
    let jars = root.join("custom_nifi/jars");
    fs::create_dir_all(&jars).unwrap_or_else(|e| panic!("create {}: {e}", jars.display()));
    write(&root.join("custom_nifi/Dockerfile"), RECIPE);
    write(&jars.join("postgresql.json"), POSTGRES_MANIFEST);
    write(&root.join("ecs_task_definition.tf"), TASK_DEFINITION);
}

/// Add a manifest file to the default manifests directory.
pub fn write_manifest(root: &Path, file_name: &str, content: &str) {
    write(&root.join("custom_nifi/jars").join(file_name), content);
}

fn write(path: &Path, content: &str) {
    fs::write(path, content).unwrap_or_else(|e| panic!("write {}: {e}", path.display()));
}
