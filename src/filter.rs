use std::collections::HashSet;

/// Decides which record ids make it into an index.
pub trait IdFilter {
    fn accept(&self, id: &str) -> bool;
}

impl<F> IdFilter for F
where
    F: Fn(&str) -> bool,
{
    fn accept(&self, id: &str) -> bool {
        self(id)
    }
}

impl IdFilter for HashSet<String> {
    fn accept(&self, id: &str) -> bool {
        self.contains(id)
    }
}

pub struct AcceptAll;

impl IdFilter for AcceptAll {
    fn accept(&self, _id: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_and_sets() {
        let paired = |id: &str| id.ends_with("/1");
        assert!(paired.accept("read/1"));
        assert!(!paired.accept("read/2"));

        let wanted: HashSet<String> = ["a".to_string()].into();
        assert!(wanted.accept("a"));
        assert!(!wanted.accept("b"));
        assert!(AcceptAll.accept(""));
    }
}
