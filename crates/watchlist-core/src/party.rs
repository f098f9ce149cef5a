use serde::{Deserialize, Serialize};

/// Input side of scoring: one ISO 20022 party, already transformed by the
/// party normaliser (C6) into the same shape used for indexed entities so
/// the scorer can treat both sides symmetrically.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub party_index: usize,
    pub role: String,
    pub name: Option<String>,
    pub aliases: Vec<String>,

    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub country_iso: Option<String>,
    pub address_line: Option<String>,

    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub place_of_birth: Option<String>,
    pub country_of_residence: Option<String>,

    pub iban: Option<String>,
    pub bic: Option<String>,

    pub lei: Option<String>,
    pub any_bic: Option<String>,
    pub identifier: Option<String>,
    pub other_identifiers: Vec<String>,
    pub account_id: Option<String>,
}

impl Party {
    pub fn new(party_index: usize, role: impl Into<String>) -> Self {
        Self {
            party_index,
            role: role.into(),
            ..Default::default()
        }
    }

    /// A missing name is backfilled, in order, from: BIC, LEI, any
    /// structured Identifier, Account Id (spec §4.5 / SPEC_FULL.md §11).
    pub fn display_name(&self) -> Option<String> {
        self.name.clone().or_else(|| self.bic.clone()).or_else(|| self.lei.clone()).or_else(|| {
            self.identifier
                .clone()
                .or_else(|| self.account_id.clone())
        })
    }

    pub fn dob_year(&self) -> Option<i32> {
        self.date_of_birth
            .as_deref()
            .and_then(|d| d.get(0..4))
            .and_then(|y| y.parse::<i32>().ok())
    }
}
