//! Minimal ISO 20022 `pacs.008`-shaped extractor (SPEC_FULL.md §6): pulls
//! the debtor/creditor/agent party blocks and the settlement amount out of
//! a `FIToFICstmrCdtTrf` document. It is not a general ISO 20022 toolkit
//! and does not attempt schema validation — grounded in
//! `original_source/src/isoparser.py` (the `pacs.008.001.09` namespace and
//! the `Dbtr/Nm`, `Cdtr/Nm` lookups) and
//! `original_source/src/returnitems.py` (the party field shape: role,
//! name, address, contact, account, identifiers).
//!
//! Malformed or unrecognised input is a `ClientError`, not a parser bug —
//! callers should map `Err` from [`parse_pacs008`] straight to HTTP 400.

use anyhow::{bail, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

#[derive(Debug, Default, Clone)]
pub struct RawParty {
    pub role: &'static str,
    pub name: Option<String>,
    pub aliases: Vec<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub address_line: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub place_of_birth: Option<String>,
    pub country_of_residence: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub any_bic: Option<String>,
    pub lei: Option<String>,
    pub identifier: Option<String>,
    pub account_id: Option<String>,
    pub other_identifiers: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct RawTransaction {
    pub amount: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ParsedMessage {
    pub parties: Vec<RawParty>,
    pub transaction: RawTransaction,
}

/// Tags that open a party block, and the role each one carries.
const PARTY_ROOTS: [(&str, &str); 4] = [
    ("Dbtr", "Debtor"),
    ("Cdtr", "Creditor"),
    ("DbtrAgt", "DebtorAgent"),
    ("CdtrAgt", "CreditorAgent"),
];

/// Account blocks are siblings of the party block they belong to, keyed
/// by the same role so their fields land on the right `RawParty`.
const ACCOUNT_ROOTS: [(&str, &str); 2] = [("DbtrAcct", "Debtor"), ("CdtrAcct", "Creditor")];

fn local_name(raw: &[u8]) -> String {
    let s = String::from_utf8_lossy(raw);
    match s.rfind(':') {
        Some(i) => s[i + 1..].to_string(),
        None => s.to_string(),
    }
}

fn party_index(parties: &mut Vec<RawParty>, role: &'static str) -> usize {
    if let Some(i) = parties.iter().position(|p| p.role == role) {
        return i;
    }
    parties.push(RawParty { role, ..Default::default() });
    parties.len() - 1
}

fn split_aliases(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        if let Ok(values) = serde_json::from_str::<Vec<String>>(trimmed) {
            return values.into_iter().map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect();
        }
    }
    trimmed
        .split(|c| c == '|' || c == ';' || c == ',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Parses one `pacs.008` document into its party blocks and the
/// transaction's settlement amount/currency.
pub fn parse_pacs008(xml: &[u8]) -> Result<ParsedMessage> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut parties: Vec<RawParty> = Vec::new();
    let mut transaction = RawTransaction::default();

    // Tag name of the party/account block we're currently inside, and the
    // RawParty index its fields should land on. `None` outside any block.
    let mut block: Option<(String, usize)> = None;
    let mut saw_message_root = false;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| anyhow::anyhow!("malformed XML: {e}"))?;
        match event {
            Event::Start(ref e) => {
                let name = local_name(e.name().as_ref());
                if name == "Document" || name == "FIToFICstmrCdtTrf" || name == "CdtTrfTxInf" {
                    saw_message_root = true;
                }
                if block.is_none() {
                    if let Some((_, role)) = PARTY_ROOTS.iter().find(|(tag, _)| *tag == name) {
                        block = Some((name.clone(), party_index(&mut parties, role)));
                    } else if let Some((_, role)) = ACCOUNT_ROOTS.iter().find(|(tag, _)| *tag == name) {
                        block = Some((name.clone(), party_index(&mut parties, role)));
                    }
                }
                if name == "IntrBkSttlmAmt" {
                    for attr in e.attributes().flatten() {
                        if local_name(attr.key.as_ref()) == "Ccy" {
                            transaction.currency = Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                    }
                }
                stack.push(name);
            }
            Event::Empty(ref e) => {
                let name = local_name(e.name().as_ref());
                if name == "IntrBkSttlmAmt" {
                    for attr in e.attributes().flatten() {
                        if local_name(attr.key.as_ref()) == "Ccy" {
                            transaction.currency = Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                    }
                }
            }
            Event::End(ref e) => {
                let name = local_name(e.name().as_ref());
                if let Some((root, _)) = &block {
                    if root == &name {
                        block = None;
                    }
                }
                stack.pop();
            }
            Event::Text(ref e) => {
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if text.is_empty() {
                    continue;
                }
                let Some((root, idx)) = &block else {
                    if stack.last().map(String::as_str) == Some("IntrBkSttlmAmt") {
                        transaction.amount = Some(text);
                    }
                    continue;
                };
                let root_depth = stack.iter().rposition(|t| t == root).unwrap_or(0);
                let rel: Vec<&str> = stack[root_depth + 1..].iter().map(String::as_str).collect();
                apply_field(&mut parties[*idx], &rel, &text);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_message_root {
        bail!("not a recognised pacs.008 FIToFICstmrCdtTrf message");
    }
    if parties.is_empty() {
        bail!("no debtor, creditor, or agent party blocks found");
    }

    Ok(ParsedMessage { parties, transaction })
}

fn apply_field(party: &mut RawParty, rel: &[&str], text: &str) {
    match rel {
        ["Nm"] => party.name = Some(text.to_string()),
        ["FinInstnId", "Nm"] if party.name.is_none() => party.name = Some(text.to_string()),
        ["FinInstnId", "BICFI"] => party.bic = Some(text.to_string()),
        ["FinInstnId", "LEI"] => party.lei = Some(text.to_string()),
        ["PstlAdr", "StrtNm"] => party.street = Some(text.to_string()),
        ["PstlAdr", "BldgNb"] => {
            party.street = Some(match party.street.take() {
                Some(street) => format!("{street} {text}"),
                None => text.to_string(),
            })
        }
        ["PstlAdr", "TwnNm"] => party.city = Some(text.to_string()),
        ["PstlAdr", "CtrySubDvsn"] => party.state = Some(text.to_string()),
        ["PstlAdr", "PstCd"] => party.postal_code = Some(text.to_string()),
        ["PstlAdr", "Ctry"] => party.country = Some(text.to_string()),
        ["PstlAdr", "AdrLine"] => party.address_line = Some(text.to_string()),
        ["CtctDtls", "EmailAdr"] => party.email = Some(text.to_string()),
        ["CtctDtls", "PhneNb"] => party.phone = Some(text.to_string()),
        ["CtryOfRes"] => party.country_of_residence = Some(text.to_string()),
        ["Id", "PrvtId", "DtAndPlcOfBirth", "BirthDt"] => party.date_of_birth = Some(text.to_string()),
        ["Id", "PrvtId", "DtAndPlcOfBirth", "CityOfBirth"] => party.place_of_birth = Some(text.to_string()),
        ["Id", "PrvtId", "Othr", "Id"] => party.identifier = Some(text.to_string()),
        ["Id", "OrgId", "AnyBIC"] => party.any_bic = Some(text.to_string()),
        ["Id", "OrgId", "LEI"] => party.lei = Some(text.to_string()),
        ["Id", "OrgId", "Othr", "Id"] => party.identifier = Some(text.to_string()),
        ["Id", "IBAN"] => party.iban = Some(text.to_string()),
        ["Id", "Othr", "Id"] => party.account_id = Some(text.to_string()),
        ["Aliases"] => party.aliases = split_aliases(text),
        _ => {}
    }
}
