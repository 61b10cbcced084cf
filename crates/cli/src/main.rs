//! Souk CLI - database migrations and catalog management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! souk-cli migrate
//!
//! # Load products, shipping rates, coupons, payment methods and settings
//! souk-cli seed data/seed.yaml
//!
//! # Create a coupon
//! souk-cli coupon create -c WELCOME20 -t percentage -v 20 --minimum 200 --limit 100
//!
//! # Take a payment method offline
//! souk-cli payment-method disable cod
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Seed the catalog from a YAML file
//! - `coupon create|deactivate` - Manage coupons
//! - `payment-method enable|disable` - Toggle payment methods

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

#[derive(Parser)]
#[command(name = "souk-cli")]
#[command(author, version, about = "Souk CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed the database from a YAML file
    Seed {
        /// Path to the seed file
        file: String,
    },
    /// Manage coupons
    Coupon {
        #[command(subcommand)]
        action: CouponAction,
    },
    /// Enable or disable payment methods
    PaymentMethod {
        #[command(subcommand)]
        action: PaymentMethodAction,
    },
}

#[derive(Subcommand)]
enum CouponAction {
    /// Create a new coupon
    Create {
        /// Coupon code (stored uppercase)
        #[arg(short, long)]
        code: String,

        /// Discount type (`fixed` or `percentage`)
        #[arg(short = 't', long = "type", default_value = "percentage")]
        discount_type: String,

        /// Amount off, or percent off for percentage coupons
        #[arg(short, long)]
        value: Decimal,

        /// Minimum subtotal required
        #[arg(long, default_value = "0")]
        minimum: Decimal,

        /// Cap on the discount of percentage coupons
        #[arg(long)]
        max_discount: Option<Decimal>,

        /// Total number of redemptions allowed
        #[arg(long)]
        limit: Option<i32>,

        /// Start of validity (RFC 3339)
        #[arg(long)]
        starts_at: Option<DateTime<Utc>>,

        /// End of validity (RFC 3339)
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,

        /// Restrict the coupon to one currency
        #[arg(long)]
        currency: Option<String>,
    },
    /// Deactivate a coupon
    Deactivate {
        /// Coupon code
        code: String,
    },
}

#[derive(Subcommand)]
enum PaymentMethodAction {
    /// Offer the payment method at checkout
    Enable {
        /// Payment method code
        code: String,
    },
    /// Stop offering the payment method
    Disable {
        /// Payment method code
        code: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { file } => commands::seed::from_file(&file).await?,
        Commands::Coupon { action } => match action {
            CouponAction::Create {
                code,
                discount_type,
                value,
                minimum,
                max_discount,
                limit,
                starts_at,
                expires_at,
                currency,
            } => {
                let coupon = commands::coupon::build(commands::coupon::CouponArgs {
                    code: &code,
                    discount_type: &discount_type,
                    value,
                    minimum,
                    max_discount,
                    limit,
                    starts_at,
                    expires_at,
                    currency: currency.as_deref(),
                })?;
                commands::coupon::create(&coupon).await?;
            }
            CouponAction::Deactivate { code } => commands::coupon::deactivate(&code).await?,
        },
        Commands::PaymentMethod { action } => match action {
            PaymentMethodAction::Enable { code } => {
                commands::payment_method::set_enabled(&code, true).await?;
            }
            PaymentMethodAction::Disable { code } => {
                commands::payment_method::set_enabled(&code, false).await?;
            }
        },
    }
    Ok(())
}
