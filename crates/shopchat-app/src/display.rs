//! Terminal presentation of rendered messages and product listings.

use colored::Colorize;

use shopchat_chat::{ProductCard, RenderedMessage, Span};
use shopchat_core::config::DisplayConfig;
use shopchat_core::{ProductRef, Sender};

const INDENT: &str = "    ";

/// Formats transcript entries for a terminal.
#[derive(Debug, Clone)]
pub struct TranscriptPrinter {
    color: bool,
    show_prices: bool,
}

impl TranscriptPrinter {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            color: config.color,
            show_prices: config.show_prices,
        }
    }

    /// Format one message: speaker label, paragraphs, then product cards.
    pub fn format_message(&self, message: &RenderedMessage) -> String {
        let label = match message.sender {
            Sender::User => self.styled("you", |s| s.green().bold().to_string()),
            Sender::Bot => self.styled("shop", |s| s.bright_magenta().bold().to_string()),
        };

        let mut out = format!("{}>", label);
        for paragraph in &message.paragraphs {
            if paragraph.spaced {
                out.push('\n');
            }
            out.push(' ');
            out.push_str(&self.format_spans(&paragraph.spans));
            out.push('\n');
        }
        if message.paragraphs.is_empty() {
            out.push('\n');
        }

        for (index, card) in message.products.iter().enumerate() {
            out.push_str(&self.format_card(index + 1, card));
            out.push('\n');
        }
        out
    }

    /// Format a plain product listing, one line per product.
    pub fn format_catalog(&self, products: &[ProductRef]) -> String {
        if products.is_empty() {
            return "No products available.\n".to_string();
        }
        products
            .iter()
            .enumerate()
            .map(|(index, product)| {
                format!("{}{}. {}\n", INDENT, index + 1, self.describe(product))
            })
            .collect()
    }

    fn format_spans(&self, spans: &[Span]) -> String {
        spans
            .iter()
            .map(|span| {
                if span.emphasized {
                    self.styled(&span.text, |s| s.bold().to_string())
                } else {
                    span.text.clone()
                }
            })
            .collect()
    }

    fn format_card(&self, position: usize, card: &ProductCard) -> String {
        let marker = if card.is_primary {
            self.styled("★", |s| s.yellow().bold().to_string())
        } else {
            " ".to_string()
        };
        let line = format!("{}. {}", position, self.describe(&card.product));
        let line = if card.is_primary {
            self.styled(&line, |s| s.bold().to_string())
        } else {
            line
        };
        format!("{}{} {}", INDENT, marker, line)
    }

    fn describe(&self, product: &ProductRef) -> String {
        let mut parts = vec![product.title.clone()];
        if !product.brand.is_empty() {
            parts.push(product.brand.clone());
        }
        if self.show_prices && product.price > 0.0 {
            parts.push(format!("{:.2}", product.price));
        }
        parts.join(" · ")
    }

    fn styled(&self, text: &str, style: impl Fn(&str) -> String) -> String {
        if self.color {
            style(text)
        } else {
            text.to_string()
        }
    }
}
