use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::Amount;
use crate::model::{
    CartEvent, Catalog, DiscountKind, DiscountRule, ModelError, PricingResult, Quantity, RuleSet,
};

/// Errors that can occur when reading or writing csv files
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("{path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized action '{action}'")]
    UnrecognizedAction { line: usize, action: String },

    #[error("line {line}: unrecognized rule kind '{kind}'")]
    UnrecognizedKind { line: usize, kind: String },

    #[error("line {line}: missing {field}")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: invalid quantity '{value}'")]
    InvalidQuantity { line: usize, value: String },

    #[error("line {line}: invalid {field} '{value}'")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("failed to write results: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush results: {0}")]
    Flush(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct EventRow {
    action: String,
    product: Option<String>,
    quantity: Option<String>,
    rule: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    product: String,
    price: f64,
}

#[derive(Debug, Deserialize)]
struct RuleRow {
    name: String,
    kind: String,
    threshold: Option<String>,
    amount: Option<f64>,
    percentage: Option<u8>,
    total_threshold: Option<u64>,
    product_threshold: Option<Quantity>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    step: usize,
    subtotal: String,
    shipping_fee: String,
    gift_wrap_fee: String,
    discount_name: String,
    discount: String,
    grand_total: String,
}

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>, CsvError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })
}

/// Read cart events from a csv file with an `action,product,quantity,rule` header
pub fn read_events(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<CartEvent, CsvError>>, CsvError> {
    let reader = open(path.as_ref())?;

    Ok(reader
        .into_deserialize::<EventRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            match row.action.to_ascii_lowercase().as_str() {
                "set" => {
                    let product = row.product.ok_or(CsvError::MissingField {
                        line,
                        field: "product",
                    })?;
                    let quantity = parse_quantity(line, row.quantity.as_deref())?;
                    Ok(CartEvent::SetQuantity { product, quantity })
                }
                "enable" => {
                    let rule = row.rule.ok_or(CsvError::MissingField { line, field: "rule" })?;
                    Ok(CartEvent::EnableRule { rule })
                }
                "disable" => {
                    let rule = row.rule.ok_or(CsvError::MissingField { line, field: "rule" })?;
                    Ok(CartEvent::DisableRule { rule })
                }
                "submit" => Ok(CartEvent::Submit),
                _ => Err(CsvError::UnrecognizedAction {
                    line,
                    action: row.action,
                }),
            }
        }))
}

/// An empty quantity counts as zero; anything but a non-negative integer is rejected.
fn parse_quantity(line: usize, value: Option<&str>) -> Result<Quantity, CsvError> {
    match value {
        None | Some("") => Ok(0),
        Some(value) => value.parse().map_err(|_| CsvError::InvalidQuantity {
            line,
            value: value.to_string(),
        }),
    }
}

/// Read a product catalog from a csv file with a `product,price` header
pub fn read_catalog(path: impl AsRef<Path>) -> Result<Catalog, CsvError> {
    let reader = open(path.as_ref())?;

    let entries = reader
        .into_deserialize::<CatalogRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2;
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            Ok((row.product, parse_money(line, "price", row.price)?))
        })
        .collect::<Result<Vec<_>, CsvError>>()?;

    Ok(Catalog::new(entries)?)
}

/// Read a discount rule table; row order is kept as rule order
pub fn read_rules(path: impl AsRef<Path>) -> Result<RuleSet, CsvError> {
    let reader = open(path.as_ref())?;

    let rules = reader
        .into_deserialize::<RuleRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2;
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            rule_from_row(line, row)
        })
        .collect::<Result<Vec<_>, CsvError>>()?;

    Ok(RuleSet::new(rules)?)
}

/// Turn one flat table row into the rule variant its `kind` names.
fn rule_from_row(line: usize, row: RuleRow) -> Result<DiscountRule, CsvError> {
    let missing = |field| CsvError::MissingField { line, field };
    let percentage = || row.percentage.ok_or(missing("percentage"));
    let threshold = row.threshold.as_deref().ok_or(missing("threshold"));

    let kind = match row.kind.to_ascii_lowercase().as_str() {
        "cart_total" => DiscountKind::CartTotal {
            threshold: parse_money(
                line,
                "threshold",
                parse_number(line, "threshold", threshold?)?,
            )?,
            amount: parse_money(line, "amount", row.amount.ok_or(missing("amount"))?)?,
        },
        "product_quantity" => DiscountKind::ProductQuantity {
            threshold: parse_number(line, "threshold", threshold?)?,
            percentage: percentage()?,
        },
        "total_quantity" => DiscountKind::TotalQuantity {
            threshold: parse_number(line, "threshold", threshold?)?,
            percentage: percentage()?,
        },
        "tiered_quantity" => DiscountKind::TieredQuantity {
            total_threshold: row.total_threshold.ok_or(missing("total_threshold"))?,
            product_threshold: row.product_threshold.ok_or(missing("product_threshold"))?,
            percentage: percentage()?,
        },
        _ => {
            return Err(CsvError::UnrecognizedKind {
                line,
                kind: row.kind,
            });
        }
    };

    Ok(DiscountRule::new(row.name, kind))
}

fn parse_number<T: std::str::FromStr>(
    line: usize,
    field: &'static str,
    value: &str,
) -> Result<T, CsvError> {
    value.parse().map_err(|_| CsvError::InvalidNumber {
        line,
        field,
        value: value.to_string(),
    })
}

/// Largest money value accepted from a file, in currency units.
const MAX_MONEY: f64 = 1_000_000_000.0;

/// Money fields must be finite and within `MAX_MONEY` either way.
fn parse_money(line: usize, field: &'static str, value: f64) -> Result<Amount, CsvError> {
    if !value.is_finite() || value.abs() > MAX_MONEY {
        return Err(CsvError::InvalidNumber {
            line,
            field,
            value: value.to_string(),
        });
    }
    Ok(Amount::from_float(value))
}

/// Write one csv row per pricing result
pub fn write_results<'a>(
    writer: impl io::Write,
    results: impl IntoIterator<Item = &'a PricingResult>,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(writer);

    for (idx, result) in results.into_iter().enumerate() {
        let row = OutputRow {
            step: idx + 1,
            subtotal: result.subtotal.to_string(),
            shipping_fee: result.shipping_fee.to_string(),
            gift_wrap_fee: result.gift_wrap_fee.to_string(),
            discount_name: result.discount.name().unwrap_or_default(),
            discount: result.discount.amount.to_string(),
            grand_total: result.grand_total.to_string(),
        };
        writer.serialize(&row)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiscountResult, Quantities};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn events(content: &str) -> Vec<Result<CartEvent, CsvError>> {
        let file = write_csv(content);
        read_events(file.path()).unwrap().collect()
    }

    #[test]
    fn read_set_quantity() {
        let results = events("action,product,quantity,rule\nset,Product A,11,\n");
        assert_eq!(results.len(), 1);

        let event = results.into_iter().next().unwrap().unwrap();
        assert_eq!(
            event,
            CartEvent::SetQuantity {
                product: "Product A".into(),
                quantity: 11,
            }
        );
    }

    #[test]
    fn read_rule_toggles_and_submit() {
        let results = events(
            "action,product,quantity,rule\n\
             enable,,,flat_10_discount\n\
             disable,,,flat_10_discount\n\
             submit\n",
        );
        let results: Vec<CartEvent> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            results,
            vec![
                CartEvent::EnableRule {
                    rule: "flat_10_discount".into()
                },
                CartEvent::DisableRule {
                    rule: "flat_10_discount".into()
                },
                CartEvent::Submit,
            ]
        );
    }

    #[test]
    fn read_with_whitespace() {
        let results = events("action, product, quantity, rule\nset, Product B, 3,\n");
        assert_eq!(results.len(), 1);
        assert!(matches!(
            &results[0],
            Ok(CartEvent::SetQuantity { product, quantity: 3 }) if product == "Product B"
        ));
    }

    #[test]
    fn empty_quantity_is_zero() {
        let results = events("action,product,quantity,rule\nset,Product A,,\n");
        assert!(matches!(
            results[0],
            Ok(CartEvent::SetQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn negative_or_non_numeric_quantity_is_rejected() {
        let results = events("action,product,quantity,rule\nset,Product A,-2,\nset,Product A,lots,\n");
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0].as_ref().unwrap_err(),
            CsvError::InvalidQuantity { line: 2, value } if value == "-2"
        ));
        assert!(matches!(
            results[1].as_ref().unwrap_err(),
            CsvError::InvalidQuantity { line: 3, .. }
        ));
    }

    #[test]
    fn read_returns_error_for_unknown_action() {
        let results = events("action,product,quantity,rule\ncheckout,,,\n");
        assert!(matches!(
            results[0].as_ref().unwrap_err(),
            CsvError::UnrecognizedAction { line: 2, .. }
        ));
    }

    #[test]
    fn read_returns_error_for_missing_fields() {
        let results = events("action,product,quantity,rule\nset,,4,\nenable,,,\n");
        assert!(matches!(
            results[0].as_ref().unwrap_err(),
            CsvError::MissingField {
                line: 2,
                field: "product"
            }
        ));
        assert!(matches!(
            results[1].as_ref().unwrap_err(),
            CsvError::MissingField {
                line: 3,
                field: "rule"
            }
        ));
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let err = read_events("does/not/exist.csv").err().unwrap();
        assert!(matches!(err, CsvError::Open { .. }));
    }

    #[test]
    fn read_catalog_file() {
        let file = write_csv("product,price\nTea,3.5\nCake,12\n");
        let catalog = read_catalog(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.price("Tea"), Some(Amount::from_float(3.5)));
        assert_eq!(catalog.price("Cake"), Some(Amount::from_units(12)));
    }

    #[test]
    fn read_catalog_rejects_bad_rows() {
        let file = write_csv("product,price\nTea,free\n");
        assert!(matches!(
            read_catalog(file.path()).unwrap_err(),
            CsvError::Parse { line: 2, .. }
        ));

        let file = write_csv("product,price\nTea,0\n");
        assert!(matches!(
            read_catalog(file.path()).unwrap_err(),
            CsvError::Model(ModelError::NonPositivePrice(..))
        ));
    }

    #[test]
    fn read_catalog_rejects_unusable_prices() {
        for price in ["inf", "NaN", "1e15", "-inf"] {
            let file = write_csv(&format!("product,price\nTea,{price}\n"));
            assert!(
                matches!(
                    read_catalog(file.path()).unwrap_err(),
                    CsvError::InvalidNumber {
                        line: 2,
                        field: "price",
                        ..
                    }
                ),
                "price {price}"
            );
        }

        let file = write_csv("product,price\nTea,1000000000\n");
        let catalog = read_catalog(file.path()).unwrap();
        assert_eq!(catalog.price("Tea"), Some(Amount::from_units(1_000_000_000)));
    }

    #[test]
    fn huge_catalog_price_prices_to_an_error() {
        let file = write_csv("product,price\nTea,1000000000\n");
        let engine = crate::PricingEngine::new(
            read_catalog(file.path()).unwrap(),
            RuleSet::default(),
            crate::PricingConfig::default(),
        );
        let quantities: Quantities = [("Tea", u32::MAX)].into_iter().collect();
        let err = engine
            .price(&quantities, &crate::EnabledRules::none())
            .unwrap_err();
        assert_eq!(err, crate::engine::PricingError::Overflow("subtotal"));
    }

    #[test]
    fn negative_flat_amount_is_read_and_grants_nothing() {
        let file = write_csv(
            "name,kind,threshold,amount,percentage,total_threshold,product_threshold\n\
             surcharge,cart_total,0,-5,,,\n",
        );
        let rules = read_rules(file.path()).unwrap();
        let engine = crate::PricingEngine::new(
            crate::Catalog::default(),
            rules,
            crate::PricingConfig::default(),
        );
        let result = engine
            .price(
                &[("Product A", 2)].into_iter().collect::<Quantities>(),
                &["surcharge"].into_iter().collect(),
            )
            .unwrap();
        assert_eq!(result.discount, DiscountResult::none());
        assert_eq!(result.grand_total, Amount::from_units(40 + 5 + 2));
    }

    #[test]
    fn read_rule_table_matches_default() {
        let file = write_csv(
            "name,kind,threshold,amount,percentage,total_threshold,product_threshold\n\
             flat_10_discount,cart_total,200,10,,,\n\
             bulk_5_discount,product_quantity,10,,5,,\n\
             bulk_10_discount,total_quantity,20,,10,,\n\
             tiered_50_discount,tiered_quantity,,,50,30,15\n",
        );
        let rules = read_rules(file.path()).unwrap();
        assert_eq!(rules, RuleSet::default());
    }

    #[test]
    fn read_rules_requires_fields_of_kind() {
        let file = write_csv(
            "name,kind,threshold,amount,percentage,total_threshold,product_threshold\n\
             flat,cart_total,200,,,,\n",
        );
        assert!(matches!(
            read_rules(file.path()).unwrap_err(),
            CsvError::MissingField {
                line: 2,
                field: "amount"
            }
        ));

        let file = write_csv(
            "name,kind,threshold,amount,percentage,total_threshold,product_threshold\n\
             bulk,total_quantity,twenty,,10,,\n",
        );
        assert!(matches!(
            read_rules(file.path()).unwrap_err(),
            CsvError::InvalidNumber {
                line: 2,
                field: "threshold",
                ..
            }
        ));
    }

    #[test]
    fn read_rules_rejects_unknown_kind() {
        let file = write_csv(
            "name,kind,threshold,amount,percentage,total_threshold,product_threshold\n\
             bogo,buy_one_get_one,,,,,\n",
        );
        assert!(matches!(
            read_rules(file.path()).unwrap_err(),
            CsvError::UnrecognizedKind { line: 2, .. }
        ));
    }

    #[test]
    fn write_results_formats_rows() {
        let result = PricingResult {
            subtotal: Amount::from_units(220),
            total_quantity: 11,
            shipping_fee: Amount::from_units(10),
            gift_wrap_fee: Amount::from_units(11),
            discount: DiscountResult::none(),
            grand_total: Amount::from_units(241),
        };
        let discounted = crate::PricingEngine::default()
            .price(
                &[("Product A", 11)].into_iter().collect::<Quantities>(),
                &["flat_10_discount", "bulk_5_discount"].into_iter().collect(),
            )
            .unwrap();

        let mut out = Vec::new();
        write_results(&mut out, [&result, &discounted]).unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(
            lines[0],
            "step,subtotal,shipping_fee,gift_wrap_fee,discount_name,discount,grand_total"
        );
        assert_eq!(lines[1], "1,220.00,10.00,11.00,,0.00,241.00");
        assert_eq!(
            lines[2],
            "2,220.00,10.00,11.00,flat_10_discount + bulk_5_discount,21.00,220.00"
        );
    }
}
