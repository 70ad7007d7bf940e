use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat,
    PathArguments, Signature, Type,
};

/// Run an async test against a fresh database, injecting its dependencies.
///
/// Test parameters may be a [`rocket::local::asynchronous::Client`] named
/// `Client`, a [`mongodb::Database`] named `Database`, or any number of
/// `Coll<T>` collection handles, in any order. The database and the test's
/// image directory are removed afterwards, even if the test panics.
///
/// `#[backend_test(admin)]` logs the client in as the bootstrap admin, and
/// `#[backend_test(citizen)]` registers the example citizen and logs in as them.
///
/// The generated tests need a MongoDB replica set at the configured `db_uri`,
/// so they are ignored unless the `mongodb-tests` feature is enabled.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let login = parse_macro_input!(args as Option<Ident>);
    let mut test_fn = parse_macro_input!(input as ItemFn);

    let injections = match injections(&test_fn.sig) {
        Ok(injections) => injections,
        Err(err) => return err.into_compile_error().into(),
    };
    let login = match login {
        None => TokenStream2::new(),
        Some(role) if role == "admin" => admin_login(),
        Some(role) if role == "citizen" => citizen_login(),
        Some(role) => {
            return syn::Error::new(role.span(), "Expected `admin` or `citizen`")
                .into_compile_error()
                .into();
        }
    };

    // The wrapper takes the test's name; the body is renamed out of the way.
    let name = test_fn.sig.ident.clone();
    let body_name = format_ident!("{}_body", name);
    test_fn.sig.ident = body_name.clone();

    let collections = injections.iter().filter_map(|injection| match injection {
        Injection::Collection(ident, ty) => Some(quote! {
            let #ident = crate::model::mongodb::Coll::<#ty>::from_db(&db);
        }),
        _ => None,
    });
    let args = injections.iter().map(Injection::arg);

    quote! {
        #[test]
        #[cfg_attr(not(feature = "mongodb-tests"), ignore = "needs a MongoDB replica set")]
        fn #name() {
            #test_fn

            log4rs_test_utils::test_logging::init_logging_once_for(["evoting_backend"], None, None);

            // Setup and cleanup get their own runtime, so a panicking test
            // cannot take the cleanup down with it.
            let housekeeping = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("backend-test-housekeeping")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("backend-test-worker")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            let (rocket_client, db, image_dir) = housekeeping.block_on(async {
                let db_uri = rocket::Config::figment()
                    .extract_inner::<String>("db_uri")
                    .expect("`db_uri` not set");
                let db_client = mongodb::Client::with_uri_str(&db_uri).await.unwrap();
                // Every test gets its own database.
                let db = db_client.database(&format!("test{}", rand::random::<u32>()));
                let store = crate::model::mongodb::Store::new(db_client, db.clone());
                let rocket_client =
                    rocket::local::asynchronous::Client::tracked(crate::rocket_for_store(store))
                        .await
                        .unwrap();

                // The login response borrows the client, so it must be gone before the move.
                {
                    #login
                }

                let image_dir = rocket_client
                    .rocket()
                    .state::<crate::Config>()
                    .unwrap()
                    .image_dir()
                    .to_owned();
                (rocket_client, db, image_dir)
            });

            // `Client` and `Database` are not `UnwindSafe`, so move them in through a mutex.
            let moved = std::sync::Mutex::new(Some((rocket_client, db.clone(), runtime)));
            let outcome = std::panic::catch_unwind(|| {
                let (rocket_client, db, runtime) = moved.lock().unwrap().take().unwrap();
                #(#collections)*
                runtime.block_on(#body_name(#(#args),*));
            });

            housekeeping.block_on(async {
                db.drop(None).await.unwrap();
                // Nothing to remove if the test stored no images.
                let _ = rocket::tokio::fs::remove_dir_all(&image_dir).await;
            });

            if let Err(cause) = outcome {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

fn admin_login() -> TokenStream2 {
    quote! {
        let config = rocket_client.rocket().state::<crate::Config>().unwrap();
        let response = rocket_client
            .post(uri!(crate::api::auth::authenticate_admin))
            .header(rocket::http::ContentType::JSON)
            .body(rocket::serde::json::json!(config.admin_credentials()).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), rocket::http::Status::Ok, "admin login failed");
    }
}

fn citizen_login() -> TokenStream2 {
    quote! {
        crate::model::mongodb::Coll::<crate::model::db::citizen::Citizen>::from_db(&db)
            .insert_one(crate::model::db::citizen::Citizen::example(), None)
            .await
            .unwrap();
        let response = rocket_client
            .post(uri!(crate::api::auth::authenticate_citizen))
            .header(rocket::http::ContentType::JSON)
            .body(
                rocket::serde::json::json!(crate::model::api::auth::CitizenLogin::example())
                    .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), rocket::http::Status::Ok, "citizen login failed");
    }
}

/// Something the wrapper passes to the test, in parameter order.
enum Injection {
    Client,
    Database,
    Collection(Ident, Type),
}

impl Injection {
    fn arg(&self) -> TokenStream2 {
        match self {
            Self::Client => quote! { rocket_client },
            Self::Database => quote! { db.clone() },
            Self::Collection(ident, _) => quote! { #ident },
        }
    }
}

/// Work out what to inject for each parameter, rejecting anything unknown.
fn injections(sig: &Signature) -> Result<Vec<Injection>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut injections = Vec::with_capacity(sig.inputs.len());
    for input in &sig.inputs {
        let injection = injection(input).ok_or_else(|| {
            syn::Error::new(
                input.span(),
                "Expected one of `_: Client`, `_: Database` or `_: Coll<T>`",
            )
        })?;
        let duplicate = injections.iter().any(|seen| {
            matches!(
                (seen, &injection),
                (Injection::Client, Injection::Client) | (Injection::Database, Injection::Database)
            )
        });
        if duplicate {
            return Err(syn::Error::new(
                input.span(),
                "Test cannot accept the same `Client` or `Database` twice",
            ));
        }
        injections.push(injection);
    }
    Ok(injections)
}

fn injection(input: &FnArg) -> Option<Injection> {
    let FnArg::Typed(pat_type) = input else {
        return None;
    };
    let Pat::Ident(pat_ident) = &*pat_type.pat else {
        return None;
    };
    let Type::Path(type_path) = &*pat_type.ty else {
        return None;
    };

    // Only the last segment matters, so `mongodb::Database` works as well as `Database`.
    let last = type_path.path.segments.last()?;
    if last.ident == "Client" {
        Some(Injection::Client)
    } else if last.ident == "Database" {
        Some(Injection::Database)
    } else if last.ident == "Coll" {
        let PathArguments::AngleBracketed(generics) = &last.arguments else {
            return None;
        };
        match generics.args.first()? {
            GenericArgument::Type(ty) => Some(Injection::Collection(pat_ident.ident.clone(), ty.clone())),
            _ => None,
        }
    } else {
        None
    }
}
