/**
 * NextBasket
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use std::env;
use std::error::Error;

use getopts::Options;
use tracing_subscriber::EnvFilter;

use nextbasket::io;
use nextbasket::types::UserId;
use nextbasket::{Recommender, Strategy};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("p", "products", "Product table file name (required). A CSV file with a header \
        line and columns product_id, aisle_id and department_id; further columns are \
        ignored.", "PATH");
    opts.optopt("t", "transactions", "Transaction table file name (required). A CSV file with \
        a header line and columns user_id, order_id, order_number, add_to_cart_order and \
        product_id; further columns are ignored.", "PATH");
    opts.optopt("u", "users", "Comma-separated user ids to predict for (optional, defaults to \
        every user seen in the transactions).", "IDS");
    opts.optopt("k", "num-recommendations", "Number of products to recommend per user \
        (optional, defaults to 10).", "NUMBER");
    opts.optopt("s", "strategy", "Ranking strategy, 'naive' or 'hybrid' (optional, defaults \
        to hybrid).", "NAME");
    opts.optopt("o", "outputfile", "Output file name (optional, output will be written to \
        stdout by default).", "PATH");
    opts.optflag("h", "help", "Print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(failure) => {
            let hint = failure.to_string();
            return print_usage_and_exit(&program, opts, Some(&hint));
        }
    };

    if matches.opt_present("h") {
        return print_usage_and_exit(&program, opts, None);
    }

    if !matches.opt_present("p") || !matches.opt_present("t") {
        return print_usage_and_exit(
            &program,
            opts,
            Some("Please specify the input tables via --products and --transactions."),
        );
    }

    let products_path = matches.opt_str("p").unwrap();
    let transactions_path = matches.opt_str("t").unwrap();
    let output_path = matches.opt_str("o");

    let k: usize = match matches.opt_get_default("k", 10) {
        Ok(k) => k,
        Err(failure) => {
            let hint = format!("Problem with option 'k': {}", failure.to_string());
            return print_usage_and_exit(&program, opts, Some(&hint));
        }
    };

    let strategy: Strategy = match matches.opt_get_default("s", Strategy::Hybrid) {
        Ok(strategy) => strategy,
        Err(failure) => {
            let hint = format!("Problem with option 's': {}", failure);
            return print_usage_and_exit(&program, opts, Some(&hint));
        }
    };

    let user_ids = match matches.opt_str("u").map(|ids| parse_user_ids(&ids)) {
        Some(Ok(ids)) => Some(ids),
        Some(Err(failure)) => {
            let hint = format!("Problem with option 'u': {}", failure);
            return print_usage_and_exit(&program, opts, Some(&hint));
        }
        None => None,
    };

    if let Err(failure) = predict(
        &products_path,
        &transactions_path,
        user_ids,
        k,
        strategy,
        output_path,
    ) {
        eprintln!("{}", failure);
        std::process::exit(1);
    }
}

fn print_usage_and_exit(program: &str, opts: Options, hint: Option<&str>) {
    if let Some(hint) = hint {
        eprintln!("\n{}\n", hint);
    }

    let brief = format!("Usage: {} [options]", program);
    eprint!("{}", opts.usage(&brief));
}

fn parse_user_ids(ids: &str) -> Result<Vec<UserId>, std::num::ParseIntError> {
    ids.split(',').map(|id| id.trim().parse()).collect()
}

fn predict(
    products_path: &str,
    transactions_path: &str,
    user_ids: Option<Vec<UserId>>,
    k: usize,
    strategy: Strategy,
    output_path: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let mut recommender = Recommender::new();

    recommender.load(products_path, transactions_path)?;
    recommender.learn_items()?;
    recommender.learn_users()?;

    let user_ids = match user_ids {
        Some(ids) => ids,
        None => recommender.user_ids()?,
    };

    let predictions = recommender.predict_many(&user_ids, k, strategy)?;

    let results: Vec<_> = user_ids.into_iter().zip(predictions).collect();
    io::write_predictions(&results, output_path)?;

    Ok(())
}
