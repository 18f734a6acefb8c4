use serde::Serialize;

/// Row filter attached to a change binding, rendered as `column=op.value`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeFilter {
    pub column: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl ChangeFilter {
    pub fn new(column: &str, operator: FilterOperator, value: impl ToString) -> Self {
        Self {
            column: column.to_string(),
            operator,
            value: value.to_string(),
        }
    }

    /// Wire form understood by the change feed service
    pub fn to_filter_string(&self) -> String {
        match self.operator {
            FilterOperator::In => format!("{}=in.({})", self.column, self.value),
            _ => format!("{}={}.{}", self.column, self.operator, self.value),
        }
    }
}

/// Comparison operators supported by the change feed service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Comma separated list of values
    In,
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
        };
        write!(f, "{}", s)
    }
}
