//! Output model: command files, auxiliary assets and the project writer.

use crate::core::constants::*;
use crate::error::Result;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// A named, ordered list of command lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandFile {
    pub name: String,
    pub folder: Option<String>,
    pub commands: Vec<String>,
    /// Index of the user function this file backs.
    #[serde(skip)]
    pub function: Option<usize>,
}

impl CommandFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), folder: None, commands: Vec::new(), function: None }
    }

    pub fn in_folder(name: impl Into<String>, folder: impl Into<String>) -> Self {
        Self { folder: Some(folder.into()), ..Self::new(name) }
    }

    /// Path relative to the functions folder, without extension.
    pub fn path(&self) -> String {
        match &self.folder {
            Some(folder) => format!("{}/{}", folder, self.name),
            None => self.name.clone(),
        }
    }

    /// The command that runs this file.
    pub fn call(&self) -> String {
        crate::core::command::function(&self.path())
    }

    pub fn add(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    pub fn add_top(&mut self, commands: Vec<String>) {
        self.commands.splice(0..0, commands);
    }

    pub fn extend(&mut self, commands: impl IntoIterator<Item = String>) {
        self.commands.extend(commands);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssetKind {
    Entity,
    Structure,
}

/// An auxiliary file kept as a JSON descriptor and written through as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Asset {
    pub kind: AssetKind,
    pub name: String,
    pub content: serde_json::Value,
}

impl Asset {
    pub fn relative_path(&self) -> PathBuf {
        let folder = match self.kind {
            AssetKind::Entity => ENTITIES_FOLDER,
            AssetKind::Structure => STRUCTURES_FOLDER,
        };
        Path::new(folder).join(format!("{}.json", self.name))
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct Project {
    pub name: String,
    pub files: Vec<CommandFile>,
    pub assets: Vec<Asset>,
    /// Messages from `$log`, in order.
    pub log_messages: Vec<String>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn add_file(&mut self, file: CommandFile) {
        log::debug!("Finished file '{}' ({} commands)", file.path(), file.len());
        self.files.push(file);
    }

    /// Assets are unique by kind and name; the first one added is kept.
    pub fn add_asset(&mut self, asset: Asset) {
        if !self.assets.iter().any(|a| a.kind == asset.kind && a.name == asset.name) {
            self.assets.push(asset);
        }
    }

    pub fn file(&self, path: &str) -> Option<&CommandFile> {
        self.files.iter().find(|f| f.path() == path)
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.file(path).is_some()
    }

    pub fn total_commands(&self) -> usize {
        self.files.iter().map(CommandFile::len).sum()
    }

    /// Write every function file and asset under `output`, returning the
    /// paths written.
    pub fn write_all(&self, output: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        let functions = output.join(FUNCTIONS_FOLDER);

        for file in &self.files {
            let path = functions.join(format!("{}.{}", file.path(), FUNCTION_EXTENSION));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut content = file.commands.join("\n");
            content.push('\n');
            fs::write(&path, content)?;
            written.push(path);
        }

        for asset in &self.assets {
            let path = output.join(asset.relative_path());
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(&asset.content)
                .map_err(|e| crate::error::CompilerError::InvalidFormat { message: e.to_string() })?;
            fs::write(&path, content)?;
            written.push(path);
        }

        log::info!("Wrote {} files to {}", written.len(), output.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_paths() {
        let root = CommandFile::new("main");
        let branch = CommandFile::in_folder("branch0", GENERATED_FOLDER);
        assert_eq!(root.path(), "main");
        assert_eq!(branch.call(), "function compiler/branch0");
    }

    #[test]
    fn test_add_top() {
        let mut file = CommandFile::new("main");
        file.add("say b");
        file.add_top(vec!["say a".into()]);
        assert_eq!(file.commands, vec!["say a", "say b"]);
    }

    #[test]
    fn test_assets_are_unique() {
        let mut project = Project::new("test");
        let asset = Asset { kind: AssetKind::Entity, name: "null".into(), content: serde_json::json!({}) };
        project.add_asset(asset.clone());
        project.add_asset(asset);
        assert_eq!(project.assets.len(), 1);
    }

    #[test]
    fn test_write_all() {
        let temp = TempDir::new().unwrap();
        let mut project = Project::new("test");
        let mut root = CommandFile::new("test");
        root.add("say hi");
        project.add_file(root);
        let mut branch = CommandFile::in_folder("branch0", GENERATED_FOLDER);
        branch.add("say nested");
        project.add_file(branch);
        project.add_asset(Asset {
            kind: AssetKind::Structure,
            name: "scatter_0".into(),
            content: serde_json::json!({ "block": "stone" }),
        });

        let written = project.write_all(temp.path()).unwrap();
        assert_eq!(written.len(), 3);
        let branch = fs::read_to_string(temp.path().join("functions/compiler/branch0.mcfunction")).unwrap();
        assert_eq!(branch, "say nested\n");
        assert!(temp.path().join("structures/scatter_0.json").exists());
    }
}
