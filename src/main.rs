use anyhow::Result;
use inquire::{Confirm, CustomType, Select, Text};

use tsundoku::core::book::Book;
use tsundoku::core::catalog::CharacterCatalog;
use tsundoku::core::config::Config;
use tsundoku::core::progress::clamp_page;
use tsundoku::services::dialogue::DialogueGenerator;
use tsundoku::services::library::{Library, NewBook};
use tsundoku::services::{llm, openbd};
use tsundoku::Error;

const GENRE_CHOICES: &[(&str, &str)] = &[
    ("study", "勉強・技術書 💪 (熱血系)"),
    ("novel", "小説・文学 🌸 (ロマンチスト)"),
    ("philosophy", "哲学・思想 🧘 (達観系)"),
    ("magazine", "雑誌・趣味 😊 (フレンドリー)"),
];

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::load_or_default();
    let client = llm::create_llm(&config);
    if client.is_none() {
        println!("LLM未設定のため、キャラクターの一言はローカル定型文になります。");
    }

    let library = Library::open(
        config.store_path(),
        CharacterCatalog::builtin(),
        DialogueGenerator::new(client),
    )
    .await;

    loop {
        let action = Select::new(
            "積読トラッカー - 何をしますか？",
            vec![
                "本棚を見る",
                "本を追加する",
                "進捗を更新する",
                "本を削除する",
                "終了",
            ],
        )
        .prompt()?;

        match action {
            "本棚を見る" => show_shelf(&library).await,
            "本を追加する" => add_book(&library).await?,
            "進捗を更新する" => update_progress(&library).await?,
            "本を削除する" => delete_book(&library).await?,
            _ => break,
        }
    }

    Ok(())
}

async fn show_shelf(library: &Library) {
    let books = library.books().await;
    if books.is_empty() {
        println!("本棚は空です。まずは一冊追加しましょう。");
        return;
    }
    for book in &books {
        println!("\n{} {}", book.character.emoji, book.title);
        println!(
            "  [{}] {}% ({}/{}ページ)",
            progress_bar(book),
            book.progress(),
            book.current_page,
            book.total_page
        );
        println!("  「{}」", book.latest_dialogue);
        if book.is_completed() {
            println!("  🎉 完読おめでとうございます！");
        }
    }
    println!();
}

fn progress_bar(book: &Book) -> String {
    let filled = (book.progress() as usize) / 10;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

async fn add_book(library: &Library) -> Result<()> {
    let isbn = Text::new("ISBN（バーコード下の数字。空欄で手入力）:").prompt()?;
    let prefill = if isbn.trim().is_empty() {
        None
    } else {
        let found = openbd::fetch_book(&isbn).await;
        match &found {
            Some(info) => println!("見つかりました: {}", info.title),
            None => println!("見つかりませんでした。手入力で続けます。"),
        }
        found
    };

    let title = Text::new("タイトル:")
        .with_initial_value(prefill.as_ref().map(|p| p.title.as_str()).unwrap_or(""))
        .prompt()?;

    let genre_cursor = prefill
        .as_ref()
        .and_then(|p| GENRE_CHOICES.iter().position(|(key, _)| *key == p.genre))
        .unwrap_or(0);
    let genre_label = Select::new(
        "ジャンル（本の人格が決まります）:",
        GENRE_CHOICES.iter().map(|(_, label)| *label).collect(),
    )
    .with_starting_cursor(genre_cursor)
    .prompt()?;
    let genre = GENRE_CHOICES
        .iter()
        .find(|(_, label)| *label == genre_label)
        .map(|(key, _)| *key)
        .unwrap_or("magazine");

    let total_page = CustomType::<u32>::new("総ページ数:")
        .with_default(prefill.as_ref().and_then(|p| p.total_page).unwrap_or(300))
        .prompt()?;

    let cover = Text::new("表紙画像URL（空欄で自動生成）:")
        .with_initial_value(
            prefill
                .as_ref()
                .and_then(|p| p.cover_image.as_deref())
                .unwrap_or(""),
        )
        .prompt()?;

    let reason = Text::new("なぜこの本を買ったのですか？:").prompt()?;

    let request = NewBook {
        title,
        genre: genre.to_string(),
        total_page,
        cover_image: (!cover.trim().is_empty()).then(|| cover.trim().to_string()),
        reason,
    };
    match library.add(request).await {
        Ok(book) => {
            println!("{} 「{}」を本棚に追加しました。", book.character.emoji, book.title);
            println!("「{}」", book.latest_dialogue);
        }
        Err(Error::Validation(message)) => println!("入力が不正です: {message}"),
        Err(e) => println!("追加に失敗しました: {e}"),
    }
    Ok(())
}

async fn update_progress(library: &Library) -> Result<()> {
    let Some(book) = pick_book(library, "どの本の進捗を更新しますか？").await? else {
        return Ok(());
    };

    let action = Select::new(
        "どう更新しますか？",
        vec!["ページ数を入力", "+50ページ", "-50ページ"],
    )
    .prompt()?;
    let new_page = match action {
        "+50ページ" => clamp_page(book.current_page.saturating_add(50), 0, book.total_page),
        "-50ページ" => book.current_page.saturating_sub(50),
        _ => {
            let page = CustomType::<u32>::new(&format!("現在のページ（0〜{}）:", book.total_page))
                .with_default(book.current_page)
                .prompt()?;
            clamp_page(page, 0, book.total_page)
        }
    };

    match library.update_progress(&book.id, new_page).await {
        Ok(updated) => {
            println!(
                "{}% ({}/{}ページ)",
                updated.progress(),
                updated.current_page,
                updated.total_page
            );
            println!("「{}」", updated.latest_dialogue);
            if updated.is_completed() {
                println!("🎉 完読おめでとうございます！");
            }
        }
        Err(e) => println!("更新できませんでした: {e}"),
    }
    Ok(())
}

async fn delete_book(library: &Library) -> Result<()> {
    let Some(book) = pick_book(library, "どの本を削除しますか？").await? else {
        return Ok(());
    };
    let confirmed = Confirm::new(&format!("「{}」を本当に削除しますか？", book.title))
        .with_default(false)
        .prompt()?;
    if confirmed {
        library.delete(&book.id).await;
        println!("削除しました。");
    }
    Ok(())
}

async fn pick_book(library: &Library, prompt: &str) -> Result<Option<Book>> {
    let books = library.books().await;
    if books.is_empty() {
        println!("本棚は空です。");
        return Ok(None);
    }
    let labels: Vec<String> = books
        .iter()
        .map(|book| {
            format!(
                "{} {} ({}%)",
                book.character.emoji,
                book.title,
                book.progress()
            )
        })
        .collect();
    let choice = Select::new(prompt, labels).raw_prompt()?;
    Ok(Some(books[choice.index].clone()))
}
