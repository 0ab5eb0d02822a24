use crate::StoreError;

const SEP: char = '\u{0}';

/// A secondary-index key built from an index name and ordered string
/// components, encoded as `\0index\0c1\0c2\0...\0`.
///
/// The trailing separator keeps a partial key from matching a longer
/// component (`a1` never matches `a10`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    index: String,
    components: Vec<String>,
}

impl CompositeKey {
    pub fn new<I, S>(index: &str, components: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        check_part(index)?;
        if index.is_empty() {
            return Err(StoreError::InvalidComponent(index.to_string()));
        }
        let components = components
            .into_iter()
            .map(Into::into)
            .collect::<Vec<String>>();
        for c in &components {
            check_part(c)?;
        }
        Ok(Self {
            index: index.to_string(),
            components,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let body = raw
            .strip_prefix(SEP)
            .and_then(|s| s.strip_suffix(SEP))
            .ok_or_else(|| StoreError::MalformedKey(raw.to_string()))?;
        let mut parts = body.split(SEP);
        let index = match parts.next() {
            Some(idx) if !idx.is_empty() => idx.to_string(),
            _ => return Err(StoreError::MalformedKey(raw.to_string())),
        };
        Ok(Self {
            index,
            components: parts.map(str::to_string).collect(),
        })
    }

    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(
            2 + self.index.len() + self.components.iter().map(|c| c.len() + 1).sum::<usize>(),
        );
        out.push(SEP);
        out.push_str(&self.index);
        out.push(SEP);
        for c in &self.components {
            out.push_str(c);
            out.push(SEP);
        }
        out
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn component(&self, pos: usize) -> Option<&str> {
        self.components.get(pos).map(String::as_str)
    }

    /// The trailing component; indexes in this workspace put the primary key
    /// last.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    pub fn is_composite(raw: &str) -> bool {
        raw.starts_with(SEP)
    }
}

/// Encoded prefix matching every key of `index` that starts with `components`.
pub fn composite_prefix(index: &str, components: &[&str]) -> Result<String, StoreError> {
    Ok(CompositeKey::new(index, components.iter().copied())?.encode())
}

/// Exclusive upper bound for a prefix scan starting at `prefix`.
pub fn range_end(prefix: &str) -> String {
    let mut end = String::with_capacity(prefix.len() + 4);
    end.push_str(prefix);
    end.push(char::MAX);
    end
}

fn check_part(part: &str) -> Result<(), StoreError> {
    if part.contains(SEP) || part.contains(char::MAX) {
        return Err(StoreError::InvalidComponent(part.to_string()));
    }
    Ok(())
}
