//! Message rendering for alert deliveries.
//!
//! Every built-in rule code has a subject and body template using `{{name}}`
//! placeholders filled from the alert context. The body is then shaped per
//! channel (SMS gets a single short line, email gets a footer).

use std::collections::BTreeMap;

use crate::models::{AlertContext, ChannelKind};

const NOT_AVAILABLE: &str = "n/d";
const SMS_MAX_CHARS: usize = 320;
const EMAIL_FOOTER: &str =
    "--\nCe message a été envoyé automatiquement par le module d'alertes de trésorerie.";

/// Subject and body ready to hand to a sender
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Subject and body templates of a rule code, if it has built-in ones
fn templates_for(code: &str) -> Option<(&'static str, &'static str)> {
    let pair = match code {
        "MARCHE_CREE" => (
            "Nouveau marché {{entity_code}}",
            "Le marché {{entity_code}} ({{entity_label}}) a été créé.",
        ),
        "PAIEMENT_RECU" => (
            "Paiement reçu sur le marché {{entity_code}}",
            "Un paiement de {{amount}} a été enregistré sur le marché {{entity_code}} ({{entity_label}}).",
        ),
        "DECAISSEMENT_VALIDE" => (
            "Décaissement validé sur le marché {{entity_code}}",
            "Un décaissement de {{amount}} a été validé sur le marché {{entity_code}} ({{entity_label}}).",
        ),
        "TRESORERIE_FAIBLE" => (
            "Trésorerie faible : {{entity_code}}",
            "Le solde de trésorerie du marché {{entity_code}} ({{entity_label}}) est de {{balance}}, \
             sous le seuil de {{threshold}}.",
        ),
        "DEADLINE_APPROCHANT" => (
            "Échéance proche : {{entity_code}}",
            "Le marché {{entity_code}} ({{entity_label}}) arrive à échéance le {{due_date}}.",
        ),
        _ => return None,
    };
    Some(pair)
}

/// Template variables for a context: amounts carry their currency
pub fn context_variables(ctx: &AlertContext) -> BTreeMap<String, String> {
    let mut vars = ctx.variables();

    if let Some(ref currency) = ctx.currency {
        for key in ["amount", "balance", "threshold"] {
            if let Some(value) = vars.get_mut(key) {
                value.push(' ');
                value.push_str(currency);
            }
        }
    }

    vars
}

/// Replaces `{{name}}` placeholders; unknown names are left untouched
pub fn substitute(template: &str, vars: &BTreeMap<String, String>) -> String {
    substitute_with(template, |name| vars.get(name).cloned())
}

fn substitute_with<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Renders the message of a rule for one channel
pub fn render(
    code: &str,
    label: &str,
    channel: ChannelKind,
    ctx: &AlertContext,
) -> RenderedMessage {
    let vars = context_variables(ctx);

    let (subject, mut body) = match templates_for(code) {
        Some((subject, body)) => (
            substitute_with(subject, |name| {
                Some(vars.get(name).cloned().unwrap_or_else(|| NOT_AVAILABLE.to_string()))
            }),
            substitute_with(body, |name| {
                Some(vars.get(name).cloned().unwrap_or_else(|| NOT_AVAILABLE.to_string()))
            }),
        ),
        None => (label.to_string(), label.to_string()),
    };

    if let Some(ref message) = ctx.message {
        body.push_str("\n\n");
        body.push_str(message);
    }

    shape_for_channel(channel, RenderedMessage { subject, body })
}

/// Adapts a rendered message to the constraints of a channel
pub fn shape_for_channel(channel: ChannelKind, message: RenderedMessage) -> RenderedMessage {
    match channel {
        ChannelKind::Sms => {
            let line = format!("{} - {}", message.subject, message.body.replace('\n', " "));
            let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
            let body = if line.chars().count() > SMS_MAX_CHARS {
                let kept: String = line.chars().take(SMS_MAX_CHARS - 3).collect();
                format!("{}...", kept)
            } else {
                line
            };
            RenderedMessage {
                subject: message.subject,
                body,
            }
        }
        ChannelKind::Email => RenderedMessage {
            body: format!("{}\n\n{}", message.body, EMAIL_FOOTER),
            subject: message.subject,
        },
        ChannelKind::Push | ChannelKind::Webhook | ChannelKind::InApp => message,
    }
}
