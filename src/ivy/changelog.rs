use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEntry {
    Update {
        name: String,
        from: String,
        to: String,
    },
    Remove {
        name: String,
        revision: String,
    },
}

impl fmt::Display for ChangeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeEntry::Update { name, from, to } => write!(f, "Update {name} {from} -> {to}"),
            ChangeEntry::Remove { name, revision } => write!(f, "Remove {name} {revision}"),
        }
    }
}

/// Edits made to one manifest, split at each save into saved and pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLog {
    saved: Vec<ChangeEntry>,
    unsaved: Vec<ChangeEntry>,
}

impl ChangeLog {
    pub fn append_unsaved(&mut self, entry: ChangeEntry) {
        self.unsaved.push(entry);
    }

    /// Move every pending entry to the saved list, keeping order.
    pub fn commit(&mut self) {
        self.saved.append(&mut self.unsaved);
    }

    pub fn saved(&self) -> &[ChangeEntry] {
        &self.saved
    }

    pub fn unsaved(&self) -> &[ChangeEntry] {
        &self.unsaved
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.unsaved.is_empty()
    }
}

impl fmt::Display for ChangeLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No logged changes");
        }
        if !self.saved.is_empty() {
            writeln!(f, "--- Saved changes ---")?;
            for entry in &self.saved {
                writeln!(f, "{entry}")?;
            }
        }
        if !self.unsaved.is_empty() {
            writeln!(f, "--- Unsaved changes ---")?;
            for entry in &self.unsaved {
                writeln!(f, "{entry}")?;
            }
        }
        Ok(())
    }
}
