use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheet-sorter")]
#[command(about = "ジュエリーカタログ台紙のセル抽出・分類ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 設定ファイル（デフォルト: ~/.config/sheet-sorter/config.json）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 台紙からセルを切り出すだけ（分類なし）
    Extract {
        /// 台紙画像
        #[arg(required = true)]
        sheet: PathBuf,

        /// 出力フォルダ
        #[arg(short, long)]
        output: PathBuf,
    },

    /// 切り出し済みセルのフォルダを分類
    Classify {
        /// rect_<n> 画像のフォルダ
        #[arg(required = true)]
        cells: PathBuf,

        /// 出力フォルダ（codes/photos/discards を作成）
        #[arg(short, long)]
        output: PathBuf,

        /// 手動分類JSONファイル
        #[arg(long)]
        overrides: Option<PathBuf>,
    },

    /// 台紙フォルダを一括処理（検出 → 分類 → 均衡補正 → 書き出し）
    Run {
        /// 台紙フォルダ
        #[arg(required = true)]
        folder: PathBuf,

        /// 出力フォルダ（台紙ごとにサブフォルダを作成）
        #[arg(short, long)]
        output: PathBuf,

        /// 手動分類JSONファイル
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// 台紙を並列に処理
        #[arg(long)]
        parallel: bool,
    },

    /// 分割済みフォルダのコードと写真を組み合わせてストアに登録
    Pair {
        /// 台紙1枚分の出力フォルダ（codes/photos を含む）
        #[arg(required = true)]
        partition: PathBuf,

        /// コードストア（JSON）
        #[arg(short, long, default_value = "codes.json")]
        store: PathBuf,
    },

    /// 写真フォルダのカテゴリを対話式にレビュー
    Review {
        /// photos フォルダ
        #[arg(required = true)]
        photos: PathBuf,

        /// 要確認（低信頼度・不明）の写真だけを表示
        #[arg(long)]
        uncertain: bool,
    },

    /// 写真1枚のカテゴリを手動で変更
    Recategorize {
        /// 写真ファイル
        #[arg(required = true)]
        image: PathBuf,

        /// カテゴリ（anillos / pulseras / "colgantes y collares" など）
        #[arg(required = true)]
        category: String,
    },

    /// 設定の確認・初期化
    Config {
        /// 現在の設定を表示
        #[arg(long)]
        show: bool,

        /// 既定値で設定ファイルを作成
        #[arg(long)]
        init: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "sheet-sorter",
            "run",
            "sheets",
            "-o",
            "out",
            "--parallel",
            "--verbose",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Run { folder, output, overrides, parallel } => {
                assert_eq!(folder, PathBuf::from("sheets"));
                assert_eq!(output, PathBuf::from("out"));
                assert!(overrides.is_none());
                assert!(parallel);
            }
            _ => panic!("run expected"),
        }
    }

    #[test]
    fn test_pair_default_store() {
        let cli = Cli::parse_from(["sheet-sorter", "pair", "out/sheet1"]);
        match cli.command {
            Commands::Pair { store, .. } => assert_eq!(store, PathBuf::from("codes.json")),
            _ => panic!("pair expected"),
        }
    }

    #[test]
    fn test_classify_requires_output() {
        assert!(Cli::try_parse_from(["sheet-sorter", "classify", "cells"]).is_err());
    }
}
