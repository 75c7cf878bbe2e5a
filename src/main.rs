use clap::Parser;
use gymcore::application::admission::AdmissionController;
use gymcore::application::linkage::MembershipLinkage;
use gymcore::application::payments::PaymentProcessor;
use gymcore::domain::ports::{
    BookingStoreBox, MembershipStoreBox, PaymentStoreBox, SessionStoreBox, WaitlistStoreBox,
};
use gymcore::infrastructure::gateway::SimulatedGateway;
use gymcore::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryMembershipStore, InMemoryPaymentStore, InMemorySessionStore,
    InMemoryWaitlistStore,
};
use gymcore::infrastructure::notify::TracingNotifier;
use gymcore::infrastructure::system::{SystemClock, UuidGenerator};
use gymcore::interfaces::csv::ops_reader::OpsReader;
use gymcore::interfaces::csv::replay::Replay;
use gymcore::interfaces::csv::report::ReportWriter;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    ops: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Secret shared with the payment gateway for webhook signatures.
    #[arg(long, env = "GYMCORE_WEBHOOK_SECRET", default_value = "gymcore-dev-secret")]
    webhook_secret: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gymcore=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let replay = match cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            use gymcore::infrastructure::rocksdb::RocksDBStore;
            let store = RocksDBStore::open(db_path).into_diagnostic()?;
            assemble(
                Box::new(store.clone()),
                Box::new(store.clone()),
                Box::new(store.clone()),
                Box::new(store.clone()),
                Box::new(store.clone()),
                Box::new(store),
                &cli.webhook_secret,
            )
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "warning: --db-path requires the storage-rocksdb feature; using in-memory stores"
            );
            in_memory_replay(&cli.webhook_secret)
        }
        None => in_memory_replay(&cli.webhook_secret),
    };
    let mut replay = replay;
    replay.restore().await.into_diagnostic()?;

    // Replay operations
    let file = File::open(cli.ops).into_diagnostic()?;
    let reader = OpsReader::new(file);
    for record in reader.records() {
        match record {
            Ok(op) => {
                if let Err(e) = replay.apply(op).await {
                    eprintln!("Error applying operation: {e}");
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {e}");
            }
        }
    }

    // Closing reports
    let occupancy = replay.occupancy_rows().await.into_diagnostic()?;
    let payments = replay.payment_rows().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_occupancy(&occupancy).into_diagnostic()?;
    writer.separator().into_diagnostic()?;
    writer.write_payments(&payments).into_diagnostic()?;

    Ok(())
}

fn assemble(
    sessions: SessionStoreBox,
    bookings: BookingStoreBox,
    waitlist: WaitlistStoreBox,
    payments: PaymentStoreBox,
    memberships: MembershipStoreBox,
    replay_memberships: MembershipStoreBox,
    webhook_secret: &str,
) -> Replay {
    let admission = AdmissionController::new(
        sessions,
        bookings,
        waitlist,
        Box::new(SystemClock),
        Box::new(UuidGenerator),
    );
    let processor = PaymentProcessor::new(
        payments,
        MembershipLinkage::new(memberships),
        Box::new(SimulatedGateway::new()),
        Box::new(TracingNotifier),
        Box::new(SystemClock),
        Box::new(UuidGenerator),
    );
    Replay::new(
        admission,
        processor,
        replay_memberships,
        webhook_secret,
        Box::new(SystemClock),
        Box::new(UuidGenerator),
    )
}

fn in_memory_replay(webhook_secret: &str) -> Replay {
    let memberships = InMemoryMembershipStore::new();
    assemble(
        Box::new(InMemorySessionStore::new()),
        Box::new(InMemoryBookingStore::new()),
        Box::new(InMemoryWaitlistStore::new()),
        Box::new(InMemoryPaymentStore::new()),
        Box::new(memberships.clone()),
        Box::new(memberships),
        webhook_secret,
    )
}
