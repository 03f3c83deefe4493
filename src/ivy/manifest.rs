use crate::error::{FireantError, Result};
use crate::ivy::changelog::{ChangeEntry, ChangeLog};
use crate::ivy::document::{Document, Element};
use crate::ivy::record::{DependencyRecord, NAME, REVISION};
use crate::ivy::LICENSE_BANNER;
use log::debug;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const DEPENDENCIES_TAG: &str = "dependencies";

/// An `ivy.xml` file opened for editing.
///
/// Loading snapshots the file into a private temporary copy which lives as
/// long as the manifest; [`Manifest::revert_to_original`] restores from it and
/// dropping (or [`Manifest::close`]) deletes it.
#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
    document: Document,
    changelog: ChangeLog,
    backup: NamedTempFile,
}

impl Manifest {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let source = read_source(&path)?;
        let document = parse(&path, &source)?;

        let mut backup = tempfile::Builder::new()
            .prefix("fireant-")
            .suffix(".xml.bak")
            .tempfile()?;
        backup.write_all(source.as_bytes())?;
        backup.flush()?;

        debug!(
            "Loaded {} (backup at {})",
            path.display(),
            backup.path().display()
        );

        Ok(Self {
            path,
            document,
            changelog: ChangeLog::default(),
            backup,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn changelog(&self) -> &ChangeLog {
        &self.changelog
    }

    /// Snapshot of the declared dependencies in document order.
    pub fn records(&self) -> Vec<DependencyRecord> {
        dependencies(&self.document)
            .map(|container| {
                container
                    .element_children()
                    .map(DependencyRecord::from_element)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        dependencies(&self.document)
            .map(Element::element_count)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite the `rev` attribute of the record at `index`.
    ///
    /// A manifest without a `<dependencies>` block has nothing to edit and
    /// this is a no-op.
    pub fn modify_version(&mut self, index: usize, version: &str) -> Result<()> {
        let Some(container) = dependencies_mut(&mut self.document) else {
            return Ok(());
        };
        let len = container.element_count();
        let element = container
            .element_child_mut(index)
            .ok_or(FireantError::Index { index, len })?;

        let name = element.attribute(NAME).unwrap_or_default();
        let from = element.attribute(REVISION).unwrap_or_default();
        element.set_attribute(REVISION, version);

        self.changelog.append_unsaved(ChangeEntry::Update {
            name,
            from,
            to: version.to_string(),
        });
        Ok(())
    }

    /// Detach the record at `index`; later records shift down by one.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        let Some(container) = dependencies_mut(&mut self.document) else {
            return Ok(());
        };
        let len = container.element_count();
        let removed = container
            .remove_element_child(index)
            .ok_or(FireantError::Index { index, len })?;

        self.changelog.append_unsaved(ChangeEntry::Remove {
            name: removed.attribute(NAME).unwrap_or_default(),
            revision: removed.attribute(REVISION).unwrap_or_default(),
        });
        Ok(())
    }

    /// Serialized form written by [`Manifest::save`].
    pub fn render(&self) -> String {
        self.document.render_with_banner(LICENSE_BANNER)
    }

    /// Write the document back to the file it was loaded from.
    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone();
        self.save_to(path)
    }

    pub fn save_to<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.render())?;
        self.changelog.commit();
        debug!("Saved {}", path.as_ref().display());
        Ok(())
    }

    /// Put the pristine file back on disk and reload it, dropping every
    /// logged change.
    pub fn revert_to_original(&mut self) -> Result<()> {
        let source = fs::read_to_string(self.backup.path())?;
        fs::write(&self.path, &source)?;
        self.document = parse(&self.path, &source)?;
        self.changelog = ChangeLog::default();
        debug!("Reverted {}", self.path.display());
        Ok(())
    }

    /// Delete the backup snapshot.
    pub fn close(self) -> Result<()> {
        self.backup.close()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn backup_path(&self) -> &Path {
        self.backup.path()
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => FireantError::NotFound(path.to_path_buf()),
        ErrorKind::InvalidData => FireantError::parse(path, "file is not valid UTF-8"),
        _ => FireantError::Io(err),
    })
}

fn parse(path: &Path, source: &str) -> Result<Document> {
    Document::parse(source).map_err(|err| FireantError::parse(path, err))
}

fn dependencies(document: &Document) -> Option<&Element> {
    document
        .root()?
        .element_children()
        .find(|element| element.name() == DEPENDENCIES_TAG)
}

fn dependencies_mut(document: &mut Document) -> Option<&mut Element> {
    let root = document.root_mut()?;
    let index = root
        .element_children()
        .position(|element| element.name() == DEPENDENCIES_TAG)?;
    root.element_child_mut(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::{TempDir, tempdir};

    const IVY_XML: &str = r#"<?xml version="1.0" ?>

<!-- Licensed to the Apache Software Foundation (ASF) under one or more
   contributor license agreements.  See the NOTICE file distributed with
   this work for additional information regarding copyright ownership.
   The ASF licenses this file to You under the Apache License, Version 2.0
   (the "License"); you may not use this file except in compliance with
   the License.  You may obtain a copy of the License at

       http://www.apache.org/licenses/LICENSE-2.0

   Unless required by applicable law or agreed to in writing, software
   distributed under the License is distributed on an "AS IS" BASIS,
   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
   See the License for the specific language governing permissions and
   limitations under the License.
-->

<ivy-module version="1.0" xmlns:maven="http://ant.apache.org/ivy/maven">
	<info organisation="org.apache.nutch" module="nutch">
		<license name="Apache 2.0"
			url="https://www.apache.org/licenses/LICENSE-2.0.txt" />
		<description homepage="https://nutch.apache.org/">Nutch is an open source web-search
			software.
		</description>
	</info>

	<publications>
		<!--get the artifact from our module name -->
		<artifact conf="master" />
	</publications>

	<dependencies>
		<dependency org="org.slf4j" name="slf4j-api" rev="1.7.30" conf="*->master" />
		<dependency org="org.slf4j" name="slf4j-log4j12" rev="1.7.30" conf="*->master" />

		<dependency org="org.apache.commons" name="commons-lang3" rev="3.11" conf="*->default" />
		<dependency org="org.apache.commons" name="commons-collections4" rev="4.4" conf="*->master" />

		<!-- Commons versions move together with the
		     parent build; keep them aligned. -->

                <!-- Example of duplicate/double dependency -->
                <dependency org="org.mortbay.jetty" name="jetty" rev="6.1.26" conf="test->default" />
                <dependency org="org.mortbay.jetty" name="jetty" rev="6.1.26" />

                <dependency org="org.apache.mrunit" name="mrunit" rev="1.1.0" conf="test->default">
                        <artifact name="mrunit" maven:classifier="hadoop2" />
                        <exclude org="log4j" module="log4j" />
                </dependency>
	</dependencies>
</ivy-module>"#;

    fn fixture(content: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ivy.xml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn dependency_lines(content: &str) -> Vec<String> {
        content
            .lines()
            .filter(|line| line.contains("dependency"))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn load_projects_every_dependency_element() {
        let (_dir, path) = fixture(IVY_XML);
        let manifest = Manifest::load(&path).unwrap();

        let records = manifest.records();
        assert_eq!(records.len(), 7);
        assert_eq!(manifest.len(), 7);
        assert!(manifest.changelog().is_empty());

        let expected: BTreeMap<String, String> = [
            ("org", "org.slf4j"),
            ("name", "slf4j-api"),
            ("rev", "1.7.30"),
            ("conf", "*->master"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(records[0].attributes(), &expected);
    }

    #[test]
    fn opaque_attributes_survive_projection() {
        let (_dir, path) = fixture(IVY_XML);
        let manifest = Manifest::load(&path).unwrap();
        let mrunit = &manifest.records()[6];
        assert_eq!(mrunit.name(), Some("mrunit"));
        assert_eq!(mrunit.configuration(), Some("test->default"));
        assert_eq!(mrunit.attributes().len(), 4);
    }

    #[test]
    fn records_are_a_copy() {
        let (_dir, path) = fixture(IVY_XML);
        let manifest = Manifest::load(&path).unwrap();
        let mut records = manifest.records();
        records.clear();
        assert_eq!(manifest.records().len(), 7);
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("ivy.xml");
        assert!(matches!(
            Manifest::load(&missing),
            Err(FireantError::NotFound(_))
        ));

        let (_dir, broken) = fixture("<ivy-module><dependencies></ivy-module>");
        assert!(matches!(
            Manifest::load(&broken),
            Err(FireantError::Parse { .. })
        ));
    }

    #[test]
    fn modify_version_changes_only_the_revision() {
        let (_dir, path) = fixture(IVY_XML);
        let mut manifest = Manifest::load(&path).unwrap();
        let before = manifest.records();

        manifest.modify_version(2, "9.9.9").unwrap();

        let after = manifest.records();
        assert_eq!(after[2].revision(), Some("9.9.9"));
        assert_eq!(after[2].organization(), before[2].organization());
        assert_eq!(after[2].configuration(), before[2].configuration());
        for (i, record) in after.iter().enumerate() {
            if i != 2 {
                assert_eq!(record, &before[i]);
            }
        }

        let unsaved: Vec<String> = manifest
            .changelog()
            .unsaved()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(unsaved, vec!["Update commons-lang3 3.11 -> 9.9.9"]);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let (_dir, path) = fixture(IVY_XML);
        let mut manifest = Manifest::load(&path).unwrap();
        assert!(matches!(
            manifest.modify_version(7, "1.0"),
            Err(FireantError::Index { index: 7, len: 7 })
        ));
        assert!(matches!(
            manifest.remove(42),
            Err(FireantError::Index { .. })
        ));
        assert!(manifest.changelog().is_empty());
    }

    #[test]
    fn remove_shifts_later_records_down() {
        let (_dir, path) = fixture(IVY_XML);
        let mut manifest = Manifest::load(&path).unwrap();
        let before = manifest.records();

        manifest.remove(1).unwrap();

        let after = manifest.records();
        assert_eq!(after.len(), before.len() - 1);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1], before[2]);
        assert_eq!(after[5], before[6]);
        assert_eq!(
            manifest.changelog().unsaved()[0].to_string(),
            "Remove slf4j-log4j12 1.7.30"
        );
    }

    #[test]
    fn saving_unmodified_manifest_keeps_dependency_lines() {
        let (_dir, path) = fixture(IVY_XML);
        let mut manifest = Manifest::load(&path).unwrap();
        manifest.save().unwrap();

        let saved = fs::read_to_string(&path).unwrap();
        assert_eq!(dependency_lines(&saved), dependency_lines(IVY_XML));
        assert!(saved.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\n<!-- Licensed"));
        assert_eq!(saved.matches("Licensed to the Apache").count(), 1);
    }

    #[test]
    fn saving_preserves_comments() {
        let (_dir, path) = fixture(IVY_XML);
        let mut manifest = Manifest::load(&path).unwrap();
        manifest.remove(5).unwrap();
        manifest.save().unwrap();

        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains("<!--get the artifact from our module name -->"));
        assert!(saved.contains("<!-- Example of duplicate/double dependency -->"));
        assert!(saved.contains("<exclude org=\"log4j\" module=\"log4j\" />"));
        assert!(saved.contains(
            "\t\t<!-- Commons versions move together with the\n\t\t     parent build; keep them aligned. -->\n"
        ));
    }

    #[test]
    fn byte_order_mark_manifest_round_trips_an_edit() {
        let source = "\u{feff}<?xml version=\"1.0\"?>\n<ivy-module>\n\t<dependencies>\n\t\t<dependency org=\"a\" name=\"n\" rev=\"1\"/>\n\t</dependencies>\n</ivy-module>\n";
        let (_dir, path) = fixture(source);
        let mut manifest = Manifest::load(&path).unwrap();
        manifest.modify_version(0, "2").unwrap();
        manifest.save().unwrap();

        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains("\t\t<dependency org=\"a\" name=\"n\" rev=\"2\"/>\n"));
        assert!(saved.ends_with("</ivy-module>\n"));
        assert_eq!(saved.matches("rev=").count(), 1);

        let reloaded = Manifest::load(&path).unwrap();
        assert_eq!(reloaded.records()[0].revision(), Some("2"));

        manifest.revert_to_original().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), source);
    }

    #[test]
    fn crlf_line_endings_survive_save() {
        let (_dir, path) = fixture(
            "<ivy-module>\r\n\t<dependencies>\r\n\t\t<dependency org=\"a\" name=\"n\" rev=\"1\"/>\r\n\t\t<!-- two\r\n\t\t     lines -->\r\n\t\t<dependency org=\"b\" name=\"m\" rev=\"1\"/>\r\n\t</dependencies>\r\n</ivy-module>\r\n",
        );
        let mut manifest = Manifest::load(&path).unwrap();
        manifest.modify_version(1, "3").unwrap();
        manifest.save().unwrap();

        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains(
            "<ivy-module>\r\n\t<dependencies>\r\n\t\t<dependency org=\"a\" name=\"n\" rev=\"1\"/>\r\n\t\t<!-- two\r\n\t\t     lines -->\r\n\t\t<dependency org=\"b\" name=\"m\" rev=\"3\"/>\r\n\t</dependencies>\r\n</ivy-module>\r\n"
        ));
    }

    #[test]
    fn malformed_attributes_are_parse_errors() {
        for dependency in [
            r#"<dependency org="a" org="b" name="n" rev="1"/>"#,
            r#"<dependency org=a name="n" rev="1"/>"#,
            r#"<dependency org="a" name="n" rev="&bogus;"/>"#,
        ] {
            let (_dir, path) = fixture(&format!(
                "<ivy-module><dependencies>{dependency}</dependencies></ivy-module>"
            ));
            assert!(
                matches!(Manifest::load(&path), Err(FireantError::Parse { .. })),
                "{dependency} should not load"
            );
        }
    }

    #[test]
    fn license_banner_is_added_when_missing() {
        let (_dir, path) = fixture(
            "<ivy-module>\n\t<dependencies>\n\t\t<dependency org=\"a\" name=\"b\" rev=\"1\" />\n\t</dependencies>\n</ivy-module>\n",
        );
        let mut manifest = Manifest::load(&path).unwrap();
        manifest.save().unwrap();

        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.starts_with(crate::ivy::document::XML_DECLARATION));
        assert!(saved.contains(LICENSE_BANNER));
        assert!(saved.ends_with("</ivy-module>\n"));
        assert_eq!(Manifest::load(&path).unwrap().records().len(), 1);
    }

    #[test]
    fn save_moves_unsaved_entries() {
        let (_dir, path) = fixture(IVY_XML);
        let mut manifest = Manifest::load(&path).unwrap();
        manifest.modify_version(0, "2.0.0").unwrap();
        manifest.save().unwrap();

        assert!(manifest.changelog().unsaved().is_empty());
        assert_eq!(manifest.changelog().saved().len(), 1);

        let reloaded = Manifest::load(&path).unwrap();
        assert_eq!(reloaded.records()[0].revision(), Some("2.0.0"));
    }

    #[test]
    fn save_to_another_path_leaves_original() {
        let (dir, path) = fixture(IVY_XML);
        let copy = dir.path().join("copy.xml");
        let mut manifest = Manifest::load(&path).unwrap();
        manifest.modify_version(0, "2.0.0").unwrap();
        manifest.save_to(&copy).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), IVY_XML);
        assert!(fs::read_to_string(&copy).unwrap().contains("rev=\"2.0.0\""));
    }

    #[test]
    fn revert_restores_file_and_records() {
        let (_dir, path) = fixture(IVY_XML);
        let mut manifest = Manifest::load(&path).unwrap();
        let baseline = manifest.records();

        manifest.modify_version(0, "9.9.9").unwrap();
        manifest.remove(3).unwrap();
        manifest.save().unwrap();
        manifest.revert_to_original().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), IVY_XML);
        assert_eq!(manifest.records(), baseline);
        assert!(manifest.changelog().saved().is_empty());
        assert!(manifest.changelog().unsaved().is_empty());
    }

    #[test]
    fn close_deletes_backup() {
        let (_dir, path) = fixture(IVY_XML);
        let manifest = Manifest::load(&path).unwrap();
        let backup = manifest.backup_path().to_path_buf();
        assert!(backup.exists());

        manifest.close().unwrap();
        assert!(!backup.exists());
        assert!(path.exists());
    }

    #[test]
    fn manifest_without_dependencies_block_is_inert() {
        let (_dir, path) = fixture("<ivy-module><info module=\"x\"/></ivy-module>");
        let mut manifest = Manifest::load(&path).unwrap();
        assert!(manifest.records().is_empty());
        manifest.modify_version(0, "1.0").unwrap();
        manifest.remove(0).unwrap();
        assert!(manifest.changelog().is_empty());
    }

    #[test]
    fn first_dependencies_block_wins() {
        let (_dir, path) = fixture(
            "<m><dependencies><dependency org=\"a\" name=\"one\" rev=\"1\"/></dependencies><dependencies><dependency org=\"a\" name=\"two\" rev=\"1\"/></dependencies></m>",
        );
        let manifest = Manifest::load(&path).unwrap();
        let records = manifest.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), Some("one"));
    }
}
