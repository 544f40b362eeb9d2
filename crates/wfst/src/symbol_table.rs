// Symbol table: bidirectional label <-> string mapping.

use hashbrown::HashMap;

use crate::format::{ByteReader, write_i32, write_i64, write_string};
use crate::{EPS_LABEL, Label, Result, WfstError};

/// Binary magic number of a serialized symbol table.
const SYMBOL_TABLE_MAGIC: i32 = 2_125_658_996;

/// Symbol bound to label 0 by [`SymbolTable::new`].
pub const EPS_SYMBOL: &str = "<eps>";

/// Mapping between labels and their string symbols.
///
/// A table is usually attached to several transducers through an
/// `Arc<SymbolTable>`. Mutation through a transducer goes through
/// `Arc::make_mut`, so it never changes a table another transducer sees.
///
/// Equality is structural: same name and same label/symbol pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    name: String,
    label_to_symbol: HashMap<Label, String>,
    symbol_to_label: HashMap<String, Label>,
    /// Next label handed out by `add_symbol`.
    available_key: Label,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Create a table with `<eps>` bound to label 0.
    pub fn new() -> Self {
        let mut table = Self::empty();
        table.add_symbol(EPS_SYMBOL);
        table
    }

    /// Create a table with no symbols at all.
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            label_to_symbol: HashMap::new(),
            symbol_to_label: HashMap::new(),
            available_key: 0,
        }
    }

    /// Create a table with `<eps>` followed by `symbols` in order.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for s in symbols {
            table.add_symbol(s);
        }
        table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Add a symbol, returning its label. Known symbols keep their label.
    pub fn add_symbol(&mut self, symbol: impl Into<String>) -> Label {
        let symbol = symbol.into();
        if let Some(&label) = self.symbol_to_label.get(&symbol) {
            return label;
        }
        let label = self.available_key;
        self.insert(label, symbol);
        label
    }

    /// Bind `symbol` to an explicit label, replacing any previous binding
    /// of that label.
    pub fn add_symbol_with_label(&mut self, symbol: impl Into<String>, label: Label) {
        if let Some(old) = self.label_to_symbol.remove(&label) {
            self.symbol_to_label.remove(&old);
        }
        self.insert(label, symbol.into());
    }

    fn insert(&mut self, label: Label, symbol: String) {
        self.symbol_to_label.insert(symbol.clone(), label);
        self.label_to_symbol.insert(label, symbol);
        if label >= self.available_key {
            self.available_key = label + 1;
        }
    }

    /// Add every symbol of `other` that this table does not know yet.
    pub fn add_table(&mut self, other: &SymbolTable) {
        for (_, symbol) in other.iter() {
            self.add_symbol(symbol);
        }
    }

    pub fn get_label(&self, symbol: &str) -> Option<Label> {
        self.symbol_to_label.get(symbol).copied()
    }

    pub fn get_symbol(&self, label: Label) -> Option<&str> {
        self.label_to_symbol.get(&label).map(String::as_str)
    }

    /// Label of `symbol`, or an error naming the missing symbol.
    pub fn find(&self, symbol: &str) -> Result<Label> {
        self.get_label(symbol)
            .ok_or_else(|| WfstError::InvalidSymbolTable(format!("unknown symbol {symbol:?}")))
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.symbol_to_label.contains_key(symbol)
    }

    pub fn contains_label(&self, label: Label) -> bool {
        self.label_to_symbol.contains_key(&label)
    }

    pub fn len(&self) -> usize {
        self.label_to_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.label_to_symbol.is_empty()
    }

    /// `(label, symbol)` pairs in increasing label order.
    pub fn iter(&self) -> impl Iterator<Item = (Label, &str)> {
        let mut pairs: Vec<(Label, &str)> = self
            .label_to_symbol
            .iter()
            .map(|(&l, s)| (l, s.as_str()))
            .collect();
        pairs.sort_unstable_by_key(|&(l, _)| l);
        pairs.into_iter()
    }

    /// Render a label sequence as space separated symbols.
    pub fn labels_to_string(&self, labels: &[Label]) -> Result<String> {
        let mut out = Vec::with_capacity(labels.len());
        for &label in labels {
            if label == EPS_LABEL {
                continue;
            }
            let symbol = self
                .get_symbol(label)
                .ok_or_else(|| WfstError::InvalidSymbolTable(format!("unknown label {label}")))?;
            out.push(symbol);
        }
        Ok(out.join(" "))
    }

    /// Serialize in the binary layout embedded in transducer files.
    pub fn write_binary(&self, out: &mut Vec<u8>) {
        write_i32(out, SYMBOL_TABLE_MAGIC);
        write_string(out, &self.name);
        write_i64(out, i64::from(self.available_key));
        write_i64(out, self.len() as i64);
        for (label, symbol) in self.iter() {
            write_string(out, symbol);
            write_i64(out, i64::from(label));
        }
    }
}

/// Parse a binary symbol table starting at the reader's position.
pub(crate) fn parse_symbol_table(reader: &mut ByteReader<'_>) -> Result<SymbolTable> {
    let magic = reader.read_i32()?;
    if magic != SYMBOL_TABLE_MAGIC {
        return Err(WfstError::InvalidSymbolTable(format!(
            "bad magic number {magic}"
        )));
    }
    let mut table = SymbolTable::empty();
    table.name = reader.read_string()?;
    let available_key = reader.read_i64()?;
    let size = reader.read_i64()?;
    if size < 0 || available_key < 0 {
        return Err(WfstError::InvalidSymbolTable(format!(
            "negative size {size} or key {available_key}"
        )));
    }
    for _ in 0..size {
        let symbol = reader.read_string()?;
        let key = reader.read_i64()?;
        let label = Label::try_from(key)
            .map_err(|_| WfstError::InvalidSymbolTable(format!("label {key} out of range")))?;
        table.insert(label, symbol);
    }
    table.available_key = table.available_key.max(available_key as Label);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_binds_epsilon() {
        let table = SymbolTable::new();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get_symbol(0), Some(EPS_SYMBOL));
        assert_eq!(table.get_label(EPS_SYMBOL), Some(0));
    }

    #[test]
    fn add_symbol_is_idempotent() {
        let mut table = SymbolTable::new();
        let a = table.add_symbol("a");
        let b = table.add_symbol("b");
        assert_eq!((a, b), (1, 2));
        assert_eq!(table.add_symbol("a"), 1);
        assert_eq!(table.len(), 3);
        assert_eq!(table.find("b").unwrap(), 2);
        assert!(table.find("zz").is_err());
    }

    #[test]
    fn explicit_labels_advance_available_key() {
        let mut table = SymbolTable::new();
        table.add_symbol_with_label("x", 10);
        assert_eq!(table.add_symbol("y"), 11);
        assert!(table.contains_label(10));
        assert!(!table.contains_label(5));
    }

    #[test]
    fn merge_tables() {
        let mut a = SymbolTable::from_symbols(["a", "b"]);
        let b = SymbolTable::from_symbols(["b", "c"]);
        a.add_table(&b);
        assert_eq!(a.get_label("c"), Some(3));
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn structural_equality() {
        let a = SymbolTable::from_symbols(["a", "b"]);
        let mut b = SymbolTable::new();
        b.add_symbol("a");
        b.add_symbol("b");
        assert_eq!(a, b);
        b.add_symbol("c");
        assert_ne!(a, b);
    }

    #[test]
    fn labels_to_string_skips_epsilon() {
        let table = SymbolTable::from_symbols(["hello", "world"]);
        assert_eq!(table.labels_to_string(&[1, 0, 2]).unwrap(), "hello world");
        assert!(table.labels_to_string(&[7]).is_err());
    }

    #[test]
    fn binary_round_trip() {
        let mut table = SymbolTable::from_symbols(["a", "bb", "ccc"]);
        table.set_name("letters");
        let mut buf = Vec::new();
        table.write_binary(&mut buf);
        let mut reader = ByteReader::new(&buf);
        let parsed = parse_symbol_table(&mut reader).unwrap();
        assert_eq!(parsed, table);
        assert_eq!(reader.position(), buf.len());
    }

    #[test]
    fn reject_bad_magic() {
        let mut buf = Vec::new();
        write_i32(&mut buf, 42);
        let mut reader = ByteReader::new(&buf);
        let err = parse_symbol_table(&mut reader).unwrap_err();
        assert!(matches!(err, WfstError::InvalidSymbolTable(_)));
    }
}
