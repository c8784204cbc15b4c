use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::Frame;
use traj_core::interner::TypeMap;

/// Insertion-ordered set of particle type names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeFilter {
    names: Vec<String>,
}

impl TypeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adding a name that is already present is a no-op.
    pub fn add_type(&mut self, name: &str) {
        if !self.contains(name) {
            self.names.push(name.to_string());
        }
    }

    pub fn add_types<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            self.add_type(name.as_ref());
        }
    }

    pub fn delete_type(&mut self, name: &str) -> TrajResult<()> {
        match self.names.iter().position(|n| n == name) {
            Some(idx) => {
                self.names.remove(idx);
                Ok(())
            }
            None => Err(TrajError::Invalid(format!(
                "cannot remove type '{name}': it is not selected"
            ))),
        }
    }

    /// Removes every name or none of them.
    pub fn delete_types<S: AsRef<str>>(&mut self, names: &[S]) -> TrajResult<()> {
        if let Some(missing) = names.iter().find(|n| !self.contains(n.as_ref())) {
            return Err(TrajError::Invalid(format!(
                "cannot remove type '{}': it is not selected",
                missing.as_ref()
            )));
        }
        for name in names {
            self.delete_type(name.as_ref())?;
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Column index per particle, `None` for particles outside the filter.
    /// An empty filter puts every particle in column 0.
    pub fn columns_for(&self, frame: &Frame, types: &TypeMap) -> TrajResult<Vec<Option<usize>>> {
        if self.is_empty() {
            return Ok(vec![Some(0); frame.n_atoms]);
        }
        let ids = frame.types.as_ref().ok_or_else(|| {
            TrajError::Invalid(format!(
                "frame {} has no particle types to match {:?}",
                frame.index, self.names
            ))
        })?;
        let wanted: Vec<Option<u32>> = self.names.iter().map(|n| types.id(n)).collect();
        Ok(ids
            .iter()
            .map(|id| wanted.iter().position(|w| *w == Some(*id)))
            .collect())
    }

    /// Column titles matching `columns_for`.
    pub fn column_names(&self) -> Vec<String> {
        if self.is_empty() {
            vec!["average".to_string()]
        } else {
            self.names.clone()
        }
    }
}
