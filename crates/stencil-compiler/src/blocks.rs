/// Block registry for template inheritance
///
/// One registry lives for a single top-level compile. It maps block names
/// to their latest resolved content and remembers the order in which names
/// were first declared, since references are substituted in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockRegistry {
    entries: Vec<(String, String)>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Set a block's content, keeping its first-declared position if it exists
    pub fn set(&mut self, name: &str, content: impl Into<String>) {
        let content = content.into();
        match self.position(name) {
            Some(i) => self.entries[i].1 = content,
            None => self.entries.push((name.to_string(), content)),
        }
    }

    /// Apply one `setblock` declaration.
    ///
    /// A body containing the parent placeholder chains onto the block's
    /// current content (empty for a first declaration); any other body
    /// replaces it.
    pub fn declare(&mut self, name: &str, body: &str, parent_placeholder: &str) {
        if !self.has(name) {
            self.set(name, "");
        }

        let content = if body.contains(parent_placeholder) {
            let previous = self.get(name).unwrap_or_default();
            body.replace(parent_placeholder, previous)
        } else {
            body.to_string()
        };
        self.set(name, content);
    }

    /// Iterate `(name, content)` pairs in first-declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, content)| (name.as_str(), content.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }
}
