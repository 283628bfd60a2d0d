//! Comment rendering.
//!
//! Message templates come from configuration and carry `$PLACEHOLDER` markers;
//! this module fills them in from the invoice and the evaluation outcome.
//! Pure string work, no I/O.

use crate::payment::Invoice;

/// QR image generator; the payment link is appended as the `data` parameter.
const QR_GENERATOR_LINK: &str = "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data=";

/// Wallet deep link prefix; the coin id follows directly.
const WALLET_DEEP_LINK: &str = "https://link.trustwallet.com/send?coin=";

/// SLIP-44 coin id of the payment chain.
const COIN_ID: u32 = 714;

/// Builds the two QR code links for a payment: one opening the wallet app
/// directly, one encoding a plain payment URI for any other wallet.
///
/// Amounts are rendered as whole token units, fractions truncated.
pub fn qr_links(amount: f64, address: &str, memo: &str) -> (String, String) {
    let deep_link = format!(
        "{}{}&address={}&amount={}&memo={}",
        WALLET_DEEP_LINK, COIN_ID, address, amount as i64, memo
    );
    let uri = format!("{}?amount={}&memo={}", address, amount as i64, memo);

    let wallet_qr = format!("{}{}", QR_GENERATOR_LINK, urlencoding::encode(&deep_link));
    let generic_qr = format!("{}{}", QR_GENERATOR_LINK, urlencoding::encode(&uri));

    (wallet_qr, generic_qr)
}

/// The markdown QR line embedded via `$QR_CODE`.
pub fn qr_markdown(invoice: &Invoice) -> String {
    let Some(first) = invoice.price_points.first() else {
        return String::new();
    };

    let (wallet_qr, generic_qr) = qr_links(first.amount, &invoice.address, &invoice.memo);
    format!(
        "**QR** code: [Trust]( {} ) | [other wallet]( {} )",
        wallet_qr, generic_qr
    )
}

/// Formats a moderators mention line, e.g. `@a, @b: please take note.`.
/// An empty list renders as the empty string.
pub fn mention_moderators(moderators: &[String]) -> String {
    if moderators.is_empty() {
        return String::new();
    }

    let mentions = moderators
        .iter()
        .map(|m| format!("@{}", m))
        .collect::<Vec<_>>()
        .join(", ");

    format!("{}: please take note.", mentions)
}

/// Values available to templates.
#[derive(Debug, Default)]
pub struct TemplateValues<'a> {
    pub invoice: Option<&'a Invoice>,
    pub user: &'a str,
    pub paid_amount: f64,
    pub paid_symbol: &'a str,
    pub paid_explorer_link: &'a str,
    pub burn_explorer_link: &'a str,
    pub moderators: &'a [String],
}

/// Substitutes every `$PLACEHOLDER` in `template`.
///
/// Placeholders with no value in this context render as the template left
/// them, so a template referencing a second price point degrades gracefully
/// when only one is configured.
pub fn substitute(template: &str, values: &TemplateValues<'_>) -> String {
    let mut text = template.to_string();

    if let Some(invoice) = values.invoice {
        if let Some(first) = invoice.price_points.first() {
            text = text.replace("$PAY1_AMOUNT", &format!("{}", first.amount as i64));
            text = text.replace("$PAY1_SYMBOL", &first.symbol);
        }
        if let Some(second) = invoice.price_points.get(1) {
            text = text.replace("$PAY2_AMOUNT", &format!("{}", second.amount as i64));
            text = text.replace("$PAY2_SYMBOL", &second.symbol);
        }
        text = text.replace("$PAY1_MEMO", &invoice.memo);
        text = text.replace("$PAY1_ADDRESS", &invoice.address);
        text = text.replace("$QR_CODE", &qr_markdown(invoice));
    }

    text = text.replace("$USER", values.user);
    text = text.replace("$PAID_AMOUNT", &format!("{:.2}", values.paid_amount));
    text = text.replace("$PAID_SYMBOL", values.paid_symbol);
    text = text.replace("$PAID_EXPLORER_LINK", values.paid_explorer_link);
    text = text.replace("$BURN_EXPLORER_LINK", values.burn_explorer_link);
    text = text.replace("$MODERATORS", &mention_moderators(values.moderators));

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::types::PrNumber;
    use chrono::TimeZone;

    fn invoice(pr: u64) -> Invoice {
        let config = test_config();
        let created = chrono::Utc.with_ymd_and_hms(2022, 4, 1, 12, 0, 0).unwrap();
        Invoice::derive(&config.payment, PrNumber(pr), created)
    }

    #[test]
    fn qr_links_for_token_payment() {
        let (wallet, generic) = qr_links(
            2000.0,
            "bnb1tqq9llyr3dyjd559dha6z5r5etk3qfwk07m098",
            "3395",
        );
        assert_eq!(
            wallet,
            "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data=https%3A%2F%2Flink.trustwallet.com%2Fsend%3Fcoin%3D714%26address%3Dbnb1tqq9llyr3dyjd559dha6z5r5etk3qfwk07m098%26amount%3D2000%26memo%3D3395"
        );
        assert_eq!(
            generic,
            "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data=bnb1tqq9llyr3dyjd559dha6z5r5etk3qfwk07m098%3Famount%3D2000%26memo%3D3395"
        );
    }

    #[test]
    fn qr_links_for_native_payment() {
        let (wallet, generic) =
            qr_links(5.0, "bnb1tqq9llyr3dyjd559dha6z5r5etk3qfwk07m098", "12");
        assert_eq!(
            wallet,
            "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data=https%3A%2F%2Flink.trustwallet.com%2Fsend%3Fcoin%3D714%26address%3Dbnb1tqq9llyr3dyjd559dha6z5r5etk3qfwk07m098%26amount%3D5%26memo%3D12"
        );
        assert_eq!(
            generic,
            "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data=bnb1tqq9llyr3dyjd559dha6z5r5etk3qfwk07m098%3Famount%3D5%26memo%3D12"
        );
    }

    #[test]
    fn qr_amount_truncates_fractions() {
        let (wallet, _) = qr_links(5.9, "bnb1addr", "1");
        assert!(wallet.contains("amount%3D5%26"));
    }

    #[test]
    fn moderators_mention_line() {
        let mods = vec!["modone".to_string(), "modtwo".to_string()];
        assert_eq!(
            mention_moderators(&mods),
            "@modone, @modtwo: please take note."
        );
        assert_eq!(mention_moderators(&[]), "");
    }

    #[test]
    fn substitutes_invoice_placeholders() {
        let invoice = invoice(3395);
        let values = TemplateValues {
            invoice: Some(&invoice),
            user: "alice",
            ..TemplateValues::default()
        };

        let text = substitute(
            "Hi @$USER, send $PAY1_AMOUNT $PAY1_SYMBOL or $PAY2_AMOUNT $PAY2_SYMBOL \
             to $PAY1_ADDRESS with memo $PAY1_MEMO.\n$QR_CODE",
            &values,
        );

        assert!(text.contains("Hi @alice"));
        // $PAY1_SYMBOL is the display symbol, not the on-chain token id.
        assert!(text.contains("send 2000 TWT or 5 BNB"));
        assert!(text.contains("to bnb1tqq9llyr3dyjd559dha6z5r5etk3qfwk07m098"));
        assert!(text.contains("memo 3395."));
        assert!(text.contains("**QR** code: [Trust]( https://api.qrserver.com"));
    }

    #[test]
    fn substitutes_payment_outcome_placeholders() {
        let mods = vec!["modone".to_string()];
        let values = TemplateValues {
            paid_amount: 1999.5,
            paid_symbol: "TWT",
            paid_explorer_link: "https://explorer.binance.org/tx/AB",
            burn_explorer_link: "https://explorer.binance.org/tx/CD",
            moderators: &mods,
            ..TemplateValues::default()
        };

        let text = substitute(
            "Received $PAID_AMOUNT $PAID_SYMBOL ($PAID_EXPLORER_LINK). \
             Burned: $BURN_EXPLORER_LINK. $MODERATORS",
            &values,
        );

        assert!(text.contains("Received 1999.50 TWT"));
        assert!(text.contains("(https://explorer.binance.org/tx/AB)"));
        assert!(text.contains("Burned: https://explorer.binance.org/tx/CD"));
        assert!(text.ends_with("@modone: please take note."));
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let values = TemplateValues::default();
        assert_eq!(substitute("$SOMETHING_ELSE", &values), "$SOMETHING_ELSE");
    }
}
