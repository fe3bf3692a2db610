//! Test fixtures for common test scenarios.
//!
//! Pre-built assemblies and project layouts shared by the resolver and
//! scanner tests.

use std::path::{Path, PathBuf};

use super::assembly::AssemblyBuilder;
use crate::scan::module::type_attributes as attrs;

/// Simple name of the fixture core library.
pub const CORE_LIBRARY: &str = "System.Private.CoreLib";

/// Core library with the fundamental types.
pub fn core_library() -> AssemblyBuilder {
    let mut asm = AssemblyBuilder::new(CORE_LIBRARY);
    let object = asm.class("System", "Object", None);
    let value_type = asm.define(
        "System",
        "ValueType",
        attrs::PUBLIC | attrs::ABSTRACT,
        Some(object),
    );
    asm.define("System", "Enum", attrs::PUBLIC | attrs::ABSTRACT, Some(value_type));
    asm.class("System", "Int32", Some(value_type));
    asm.class("System", "String", Some(object));
    asm
}

/// `App`: interface `ICommand` with a public and an internal implementation.
pub fn commands_assembly() -> AssemblyBuilder {
    let mut asm = AssemblyBuilder::new("App");
    let object = asm.type_ref(CORE_LIBRARY, "System", "Object");
    let command = asm.interface("App.Commands", "ICommand");
    let create = asm.class("App.Commands", "CreateCommand", Some(object));
    asm.implement(create, command);
    let internal = asm.define("App.Commands", "InternalCommand", 0, Some(object));
    asm.implement(internal, command);
    asm
}

/// `Models`: `Entity`, `Model : Entity`, `User : Model`.
pub fn models_assembly() -> AssemblyBuilder {
    let mut asm = AssemblyBuilder::new("Models");
    let object = asm.type_ref(CORE_LIBRARY, "System", "Object");
    let entity = asm.class("Models", "Entity", Some(object));
    let model = asm.class("Models", "Model", Some(entity));
    asm.class("Models", "User", Some(model));
    asm
}

/// Write `<dir>/<name>/<name>.csproj` targeting `framework`.
pub fn write_project(dir: &Path, name: &str, framework: &str) -> PathBuf {
    write_project_with(
        dir,
        name,
        &format!("<TargetFramework>{}</TargetFramework>", framework),
    )
}

/// Write a project whose `PropertyGroup` holds `properties` verbatim.
pub fn write_project_with(dir: &Path, name: &str, properties: &str) -> PathBuf {
    let project_dir = dir.join(name);
    std::fs::create_dir_all(&project_dir).unwrap();
    let path = project_dir.join(format!("{}.csproj", name));
    std::fs::write(
        &path,
        format!(
            r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <OutputType>Library</OutputType>
    {}
  </PropertyGroup>
</Project>
"#,
            properties
        ),
    )
    .unwrap();
    path
}
