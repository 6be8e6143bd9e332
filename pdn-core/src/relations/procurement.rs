//! Procurement releases (System 6, OCDS).

use serde_json::Value;

use super::{Corpus, CorpusKind, RelationDef, Scope};
use crate::resolve::{child, field, join_members, money};

/// The procurement corpus. Records are keyed by `ocid`.
pub static PROCUREMENT: Corpus = Corpus {
    kind: CorpusKind::Procurement,
    record_key: "ocid",
    parent_key: "ocid",
    primary: "general",
    relations: &[
        RelationDef {
            name: "general",
            scope: Scope::Record,
            columns: &[
                "id",
                "date",
                "title",
                "description",
                "status",
                "procurement_method",
                "procurement_method_details",
                "main_procurement_category",
                "value_amount",
                "value_currency",
                "tender_start_date",
                "tender_end_date",
                "buyer_name",
                "buyer_id",
            ],
            row: release_row,
        },
        RelationDef {
            name: "items",
            scope: Scope::Items {
                path: &[&["tender"], &["items"]],
                candidates: &[],
            },
            columns: &[
                "item_id",
                "description",
                "quantity",
                "classification_id",
                "classification_desc",
                "unit_name",
                "unit_value_amount",
                "unit_value_currency",
            ],
            row: item_row,
        },
        RelationDef {
            name: "parties",
            scope: Scope::Items {
                path: &[&["parties"]],
                candidates: &[],
            },
            columns: &[
                "party_id",
                "name",
                "roles",
                "identifier_legal_name",
                "contact_name",
                "contact_email",
                "contact_phone",
                "address_region",
                "address_locality",
            ],
            row: party_row,
        },
        RelationDef {
            name: "awards",
            scope: Scope::Items {
                path: &[&["awards"]],
                candidates: &[],
            },
            columns: &[
                "award_id",
                "title",
                "status",
                "date",
                "value_amount",
                "value_currency",
                "suppliers",
            ],
            row: award_row,
        },
        RelationDef {
            name: "contracts",
            scope: Scope::Items {
                path: &[&["contracts"]],
                candidates: &[],
            },
            columns: &[
                "contract_id",
                "award_id",
                "title",
                "status",
                "value_amount",
                "value_currency",
                "date_signed",
                "period_start_date",
                "period_end_date",
            ],
            row: contract_row,
        },
    ],
};

fn release_row(release: &Value) -> Vec<Value> {
    let tender = child(release, "tender");
    let buyer = child(release, "buyer");
    let period = child(tender, "tenderPeriod");
    let (amount, currency) = money(tender, "value");
    vec![
        field(release, "id"),
        field(release, "date"),
        field(tender, "title"),
        field(tender, "description"),
        field(tender, "status"),
        field(tender, "procurementMethod"),
        field(tender, "procurementMethodDetails"),
        field(tender, "mainProcurementCategory"),
        amount,
        currency,
        field(period, "startDate"),
        field(period, "endDate"),
        field(buyer, "name"),
        field(buyer, "id"),
    ]
}

fn item_row(item: &Value) -> Vec<Value> {
    let classification = child(item, "classification");
    let unit = child(item, "unit");
    let (amount, currency) = money(unit, "value");
    vec![
        field(item, "id"),
        field(item, "description"),
        field(item, "quantity"),
        field(classification, "id"),
        field(classification, "description"),
        field(unit, "name"),
        amount,
        currency,
    ]
}

fn party_row(party: &Value) -> Vec<Value> {
    let contact = child(party, "contactPoint");
    let address = child(party, "address");
    vec![
        field(party, "id"),
        field(party, "name"),
        join_members(party, "roles", "name"),
        field(child(party, "identifier"), "legalName"),
        field(contact, "name"),
        field(contact, "email"),
        field(contact, "telephone"),
        field(address, "region"),
        field(address, "locality"),
    ]
}

fn award_row(award: &Value) -> Vec<Value> {
    let (amount, currency) = money(award, "value");
    vec![
        field(award, "id"),
        field(award, "title"),
        field(award, "status"),
        field(award, "date"),
        amount,
        currency,
        join_members(award, "suppliers", "name"),
    ]
}

fn contract_row(contract: &Value) -> Vec<Value> {
    let (amount, currency) = money(contract, "value");
    let period = child(contract, "period");
    vec![
        field(contract, "id"),
        field(contract, "awardID"),
        field(contract, "title"),
        field(contract, "status"),
        amount,
        currency,
        field(contract, "dateSigned"),
        field(period, "startDate"),
        field(period, "endDate"),
    ]
}
