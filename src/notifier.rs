use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::MailConfig;
use crate::mail::{HttpMailTransport, LogMailTransport, MailError, MailTransport, OutboundEmail};

#[derive(Debug, Clone)]
pub struct OrderMailItem {
    pub name: String,
    pub variant_name: Option<String>,
    pub quantity: i32,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Clone)]
pub struct OrderMailContext {
    pub unique_order_id: String,
    pub placed_at: DateTime<Utc>,
    pub customer_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub shipping_address: String,
    pub payment_method: String,
    pub total_price: i64,
    pub items: Vec<OrderMailItem>,
}

/// Renders and sends transactional mail. Order notifications are best-effort:
/// each send is attempted independently and a failure is logged, never
/// returned, so a committed order is never invalidated by the mail path.
pub struct Notifier {
    transport: Arc<dyn MailTransport>,
    from_email: String,
    admin_email: String,
}

impl Notifier {
    pub fn new(transport: Arc<dyn MailTransport>, from_email: String, admin_email: String) -> Self {
        Self {
            transport,
            from_email,
            admin_email,
        }
    }

    /// Build a notifier from config: HTTP relay when configured, otherwise
    /// the logging transport.
    pub fn from_config(config: &MailConfig) -> Self {
        let transport: Arc<dyn MailTransport> = match &config.api_url {
            Some(url) => Arc::new(HttpMailTransport::new(
                url.clone(),
                config.api_token.clone(),
            )),
            None => Arc::new(LogMailTransport),
        };
        Self::new(
            transport,
            config.from_email.clone(),
            config.admin_email.clone(),
        )
    }

    pub async fn order_placed(&self, ctx: &OrderMailContext) {
        for mail in [customer_confirmation(ctx), admin_notification(ctx, &self.admin_email)] {
            if let Err(err) = self.transport.send(&self.from_email, &mail).await {
                tracing::warn!(
                    error = %err,
                    order = %ctx.unique_order_id,
                    to = %mail.to,
                    "order notification failed"
                );
            }
        }
    }

    /// Prescription intake has no persisted side effect, so a transport
    /// failure here is surfaced to the caller instead of absorbed.
    pub async fn prescription_request(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
        message: &str,
    ) -> Result<(), MailError> {
        let body = format!(
            "A new prescription request has been submitted.\n\n\
             Name: {name}\n\
             Email: {email}\n\
             Phone: {}\n\n\
             {message}",
            phone.unwrap_or("-"),
        );
        let mail = OutboundEmail {
            to: self.admin_email.clone(),
            subject: "New Prescription Request".to_string(),
            body,
        };
        self.transport.send(&self.from_email, &mail).await
    }
}

pub fn format_price(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, (cents % 100).abs())
}

fn item_lines(ctx: &OrderMailContext) -> String {
    ctx.items
        .iter()
        .map(|item| {
            let name = match &item.variant_name {
                Some(variant) => format!("{} - {}", item.name, variant),
                None => item.name.clone(),
            };
            format!(
                "{} x {} @ {} = {}",
                item.quantity,
                name,
                format_price(item.unit_price),
                format_price(item.line_total)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn customer_confirmation(ctx: &OrderMailContext) -> OutboundEmail {
    let body = format!(
        "Thank you for your order!\n\n\
         Order ID: {}\n\
         Date: {}\n\
         Total: {}\n\
         Payment Method: {}\n\
         Shipping Address: {}\n\n\
         Items:\n{}\n\n\
         We will process your order soon.",
        ctx.unique_order_id,
        ctx.placed_at.format("%Y-%m-%d %H:%M UTC"),
        format_price(ctx.total_price),
        ctx.payment_method,
        ctx.shipping_address,
        item_lines(ctx),
    );
    OutboundEmail {
        to: ctx.email.clone(),
        subject: format!("Order Confirmation - Order {}", ctx.unique_order_id),
        body,
    }
}

fn admin_notification(ctx: &OrderMailContext, admin_email: &str) -> OutboundEmail {
    let body = format!(
        "A new order has been placed.\n\n\
         Order ID: {}\n\
         Customer: {}\n\
         Customer Email: {}\n\
         Phone: {}\n\
         Total: {}\n\
         Payment Method: {}\n\
         Shipping Address: {}\n\n\
         Items:\n{}",
        ctx.unique_order_id,
        ctx.customer_name,
        ctx.email,
        ctx.phone.as_deref().unwrap_or("-"),
        format_price(ctx.total_price),
        ctx.payment_method,
        ctx.shipping_address,
        item_lines(ctx),
    );
    OutboundEmail {
        to: admin_email.to_string(),
        subject: format!("New Order Notification - Order {}", ctx.unique_order_id),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingTransport {
        sent: Mutex<Vec<OutboundEmail>>,
        fail_for: Option<String>,
    }

    impl RecordingTransport {
        fn new(fail_for: Option<&str>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_for: fail_for.map(str::to_string),
            }
        }
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(&self, _from: &str, mail: &OutboundEmail) -> Result<(), MailError> {
            if self.fail_for.as_deref() == Some(mail.to.as_str()) {
                return Err(MailError::Rejected("550 refused".into()));
            }
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }

    fn sample_context() -> OrderMailContext {
        OrderMailContext {
            unique_order_id: "ORD-A1B2C3D4".into(),
            placed_at: Utc::now(),
            customer_name: "Guest".into(),
            email: "buyer@example.com".into(),
            phone: Some("555-0101".into()),
            shipping_address: "1 Main St".into(),
            payment_method: "cash_on_delivery".into(),
            total_price: 4500,
            items: vec![
                OrderMailItem {
                    name: "Paracetamol".into(),
                    variant_name: Some("500mg".into()),
                    quantity: 3,
                    unit_price: 1000,
                    line_total: 3000,
                },
                OrderMailItem {
                    name: "Bandages".into(),
                    variant_name: None,
                    quantity: 1,
                    unit_price: 1500,
                    line_total: 1500,
                },
            ],
        }
    }

    #[test]
    fn price_formatting() {
        assert_eq!(format_price(0), "$0.00");
        assert_eq!(format_price(5), "$0.05");
        assert_eq!(format_price(1234), "$12.34");
        assert_eq!(format_price(100000), "$1000.00");
    }

    #[test]
    fn bodies_carry_order_details() {
        let ctx = sample_context();
        let customer = customer_confirmation(&ctx);
        assert_eq!(customer.to, "buyer@example.com");
        assert!(customer.subject.contains("ORD-A1B2C3D4"));
        assert!(customer.body.contains("3 x Paracetamol - 500mg @ $10.00 = $30.00"));
        assert!(customer.body.contains("Total: $45.00"));

        let admin = admin_notification(&ctx, "admin@example.com");
        assert_eq!(admin.to, "admin@example.com");
        assert!(admin.body.contains("Customer Email: buyer@example.com"));
        assert!(admin.body.contains("1 x Bandages @ $15.00 = $15.00"));
    }

    #[tokio::test]
    async fn customer_failure_does_not_block_admin_mail() {
        let transport = Arc::new(RecordingTransport::new(Some("buyer@example.com")));
        let notifier = Notifier::new(
            transport.clone(),
            "noreply@example.com".into(),
            "admin@example.com".into(),
        );

        notifier.order_placed(&sample_context()).await;

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "admin@example.com");
    }

    #[tokio::test]
    async fn both_mails_sent_on_success() {
        let transport = Arc::new(RecordingTransport::new(None));
        let notifier = Notifier::new(
            transport.clone(),
            "noreply@example.com".into(),
            "admin@example.com".into(),
        );

        notifier.order_placed(&sample_context()).await;

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "buyer@example.com");
        assert_eq!(sent[1].to, "admin@example.com");
    }
}
