use serde::Serialize;
use std::fmt;

/// Tables the sync engine keeps in step with the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Table {
    /// Live market snapshot, refreshed every cycle.
    Athletes,
    Clubs,
    Positions,
    Statuses,
    Formations,
    /// Keyed by period.
    Matches,
    /// Keyed by (athlete, period).
    Scored,
    /// Current-period only, no period column.
    Highlights,
}

impl Table {
    pub const ALL: [Table; 8] = [
        Table::Athletes,
        Table::Clubs,
        Table::Positions,
        Table::Statuses,
        Table::Formations,
        Table::Matches,
        Table::Scored,
        Table::Highlights,
    ];

    /// Physical table name. Also the key used in `updates_tracking`.
    pub fn name(self) -> &'static str {
        match self {
            Table::Athletes => "atletas",
            Table::Clubs => "clubes",
            Table::Positions => "posicoes",
            Table::Statuses => "status",
            Table::Formations => "esquemas",
            Table::Matches => "partidas",
            Table::Scored => "pontuados",
            Table::Highlights => "destaques",
        }
    }

    pub fn is_period_scoped(self) -> bool {
        matches!(self, Table::Matches | Table::Scored)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
