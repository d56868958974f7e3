use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a category (and the transactions under it) counts as income
/// or expense. Persisted under the pt-BR names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Receita,
    Despesa,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Receita => "RECEITA",
            TransactionType::Despesa => "DESPESA",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECEITA" => Ok(TransactionType::Receita),
            "DESPESA" => Ok(TransactionType::Despesa),
            other => Err(format!("unknown transaction type: '{other}'")),
        }
    }
}

/// A named classification bucket. Static reference data; rules and
/// transactions point at categories by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Option<CategoryId>,
    pub name: String,
    pub transaction_type: TransactionType,
}

impl Category {
    pub fn new(name: &str, transaction_type: TransactionType) -> Self {
        Category {
            id: None,
            name: name.to_string(),
            transaction_type,
        }
    }
}

pub const DEFAULT_CATEGORIES: &[(&str, TransactionType)] = &[
    ("Salário", TransactionType::Receita),
    ("Rendimentos", TransactionType::Receita),
    ("Transferência Recebida", TransactionType::Receita),
    ("Alimentação", TransactionType::Despesa),
    ("Mercado", TransactionType::Despesa),
    ("Transporte", TransactionType::Despesa),
    ("Moradia", TransactionType::Despesa),
    ("Saúde", TransactionType::Despesa),
    ("Educação", TransactionType::Despesa),
    ("Lazer", TransactionType::Despesa),
    ("Serviços", TransactionType::Despesa),
    ("Tarifas Bancárias", TransactionType::Despesa),
];
