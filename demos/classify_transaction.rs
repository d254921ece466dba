use account_ai::{generate_report, Bookkeeper, CategoryFilter, ReportPeriod, TransactionClassifier};
use chrono::Utc;
use dotenv::dotenv;

const USER: &str = "demo-user";

const SAMPLES: &[&str] = &[
    "Sold 10 laptops to ABC Corp for 5 lakh rupees",
    "Paid ₹5000 for office rent",
    "Bought raw material from Steel Co for 12k",
    "Received 2,500 interest from the bank",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let mut args = std::env::args().skip(1);
    let prompts: Vec<String> = match args.next() {
        Some(first) => std::iter::once(first).chain(args).collect(),
        None => SAMPLES.iter().map(|s| s.to_string()).collect(),
    };

    let classifier = TransactionClassifier::from_env()?;
    let mut books = Bookkeeper::new();

    for prompt in &prompts {
        match books.record_from_prompt(&classifier, USER, prompt, None).await {
            Ok(tx) => println!(
                "✅ {:<9} {:>12.2}  {}  ({})",
                tx.category,
                tx.amount,
                tx.description,
                tx.party_name.as_deref().unwrap_or("-")
            ),
            Err(e) => println!("❌ {}: {}", prompt, e),
        }
    }

    let transactions = books.ledger.list(USER, CategoryFilter::All);
    let report = generate_report(&transactions, ReportPeriod::current_month(Utc::now().date_naive()));
    println!("\n📊 This month");
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
