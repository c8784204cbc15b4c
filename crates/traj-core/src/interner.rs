use fxhash::FxHashMap;

/// Interns particle type names to dense ids in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct TypeMap {
    ids: FxHashMap<String, u32>,
    names: Vec<String>,
}

impl TypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn intern_all<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<u32> {
        names.iter().map(|n| self.intern(n.as_ref())).collect()
    }

    pub fn id(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_first_appearance() {
        let mut map = TypeMap::new();
        let ids = map.intern_all(&["B", "A", "B", "C"]);
        assert_eq!(ids, vec![0, 1, 0, 2]);
        assert_eq!(map.name(1), Some("A"));
        assert_eq!(map.id("C"), Some(2));
        assert_eq!(map.id("D"), None);
    }
}
