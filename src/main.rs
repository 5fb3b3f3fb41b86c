use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sheet_sorter::{cli, config, error, pairing, pipeline, review, scanner};
use sheet_sorter::classifier::ManualOverrides;
use sheet_sorter::ocr::engine::TesseractCli;
use cli::{Cli, Commands};
use config::Config;
use error::Result;
use pairing::store::{CodeStore, JsonCodeStore};
use pipeline::Pipeline;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sheet_sorter=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_overrides(path: Option<&std::path::Path>) -> Result<ManualOverrides> {
    match path {
        Some(path) => {
            let overrides = ManualOverrides::load(path)?;
            println!("✔ 手動分類 {}件を読み込み", overrides.len());
            Ok(overrides)
        }
        None => Ok(ManualOverrides::default()),
    }
}

/// OCR が使えない場合も処理は続ける（テキストの証拠なしとして扱われる）
fn check_tesseract(ocr: &TesseractCli) {
    match ocr.check_available() {
        Ok(version) => println!("✔ {}", version),
        Err(e) => println!("⚠ {}（テキストなしとして分類を続けます）", e),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Extract { sheet, output } => {
            println!("✂ sheet-sorter - セル切り出し\n");
            let written = pipeline::extract_sheet(&sheet, &output, &config)?;
            println!("✔ {}セルを書き出し: {}", written.len(), output.display());
        }

        Commands::Classify { cells, output, overrides } => {
            println!("🔍 sheet-sorter - セル分類\n");
            let overrides = load_overrides(overrides.as_deref())?;
            let ocr = TesseractCli::new(config.tesseract.clone());
            check_tesseract(&ocr);

            let outcome = Pipeline::new(&config, &ocr, &overrides).process_cells(&cells, &output)?;
            print_outcome(&outcome);
            println!("\n✅ 分類完了: {}", output.display());
        }

        Commands::Run { folder, output, overrides, parallel } => {
            println!("🚀 sheet-sorter - 一括処理\n");
            let overrides = load_overrides(overrides.as_deref())?;
            let ocr = TesseractCli::new(config.tesseract.clone());
            check_tesseract(&ocr);

            let total = scanner::scan_sheets(&folder)?.len();
            println!("[1/2] {}枚の台紙を処理中...{}", total, if parallel { " (並列)" } else { "" });

            let bar = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}") {
                bar.set_style(style);
            }
            let on_done = |name: &str| {
                bar.set_message(name.to_string());
                bar.inc(1);
            };
            let summary = Pipeline::new(&config, &ocr, &overrides).run_batch(&folder, &output, parallel, &on_done)?;
            bar.finish_and_clear();

            println!("[2/2] 結果");
            for outcome in &summary.processed {
                print_outcome(outcome);
            }
            if !summary.failures.is_empty() {
                println!("\n⚠ 処理できなかった台紙: {}枚", summary.failures.len());
                for (name, error) in &summary.failures {
                    println!("  - {}: {}", name, error);
                }
            }
            println!(
                "\n✅ 完了: 台紙 {}枚 / セル {}個 → {}",
                summary.processed.len(),
                summary.total_cells(),
                output.display()
            );
        }

        Commands::Pair { partition, store } => {
            println!("🔗 sheet-sorter - ペアリング\n");
            let ocr = TesseractCli::new(config.tesseract.clone());
            check_tesseract(&ocr);

            let mut code_store = JsonCodeStore::open(&store)?;
            let summary = pairing::pair_partition(&partition, &ocr, &config, &mut code_store)?;
            println!("✔ 新規 {}件 / 更新 {}件", summary.inserted, summary.updated);
            if !summary.unreadable.is_empty() {
                println!("⚠ コードを読めなかったセル: {}", summary.unreadable.join(", "));
            }
            if summary.unpaired_codes + summary.unpaired_photos > 0 {
                println!(
                    "⚠ 相手のいないセル: コード {} / 写真 {}",
                    summary.unpaired_codes, summary.unpaired_photos
                );
            }
            println!("\n✅ ストア: {} ({}件)", code_store.path().display(), code_store.len());
        }

        Commands::Review { photos, uncertain } => {
            println!("🔎 sheet-sorter - カテゴリレビュー\n");
            review::run_interactive_review(&photos, uncertain)?;
        }

        Commands::Recategorize { image, category } => {
            let sidecar = review::recategorize(&image, &category)?;
            println!("✔ {} → {}", sidecar.filename, sidecar.category_display);
        }

        Commands::Config { show, init } => {
            if init {
                let path = match &cli.config {
                    Some(path) => {
                        Config::default().save_to(path)?;
                        path.clone()
                    }
                    None => Config::default().save()?,
                };
                println!("✔ 既定の設定を書き出しました: {}", path.display());
            }

            if show || !init {
                println!("設定:");
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &pipeline::SheetOutcome) {
    let p = &outcome.partition;
    let b = &outcome.balance;
    println!(
        "  {}: コード {} / 写真 {} / 破棄 {}",
        outcome.source, p.codes, p.photos, p.discards
    );
    if !b.flipped.is_empty() || b.residual > 0 {
        println!(
            "    均衡補正: {}件移動（目標 {}、残り {}）",
            b.flipped.len(),
            b.target,
            b.residual
        );
    }
}
