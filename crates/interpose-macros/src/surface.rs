//! `#[surface]` expansion
//!
//! For a trait `OrderService` the macro emits, next to the trait itself:
//! - `impl interpose::Surface for dyn OrderService` carrying the surface name
//!   and the operation table (name + parameter shape per method, in
//!   declaration order; the position is the operation's ordinal)
//! - a private proxy struct implementing `OrderService`, where every method
//!   checks the dispatch table for its ordinal and either forwards straight
//!   to the wrapped object or packs its arguments into an invocation for
//!   the interceptor

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    FnArg, Ident, ItemTrait, ReturnType, Signature, TraitItem, Type, TypeParamBound,
    spanned::Spanned,
};

use crate::attrs::SurfaceAttrs;

/// One trait method, analyzed
struct OperationInfo {
    ident: Ident,
    arg_types: Vec<Type>,
    output: TokenStream,
    shape: Vec<String>,
}

impl OperationInfo {
    fn from_signature(sig: &Signature) -> syn::Result<Self> {
        if let Some(constness) = &sig.constness {
            return Err(syn::Error::new_spanned(
                constness,
                "surface operations cannot be const",
            ));
        }
        if let Some(asyncness) = &sig.asyncness {
            return Err(syn::Error::new_spanned(
                asyncness,
                "surface operations must be synchronous",
            ));
        }
        if let Some(unsafety) = &sig.unsafety {
            return Err(syn::Error::new_spanned(
                unsafety,
                "surface operations cannot be unsafe",
            ));
        }
        if let Some(abi) = &sig.abi {
            return Err(syn::Error::new_spanned(abi, "surface operations cannot declare an ABI"));
        }
        if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
            return Err(syn::Error::new_spanned(
                &sig.generics,
                "surface operations cannot be generic",
            ));
        }
        if let Some(variadic) = &sig.variadic {
            return Err(syn::Error::new_spanned(variadic, "surface operations cannot be variadic"));
        }

        match sig.receiver() {
            Some(receiver)
                if receiver.reference.is_some()
                    && receiver.mutability.is_none()
                    && receiver.colon_token.is_none() => {}
            Some(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "surface operations must take `&self`",
                ));
            }
            None => {
                return Err(syn::Error::new(
                    sig.ident.span(),
                    "surface operations must take `&self`",
                ));
            }
        }

        let mut arg_types = Vec::new();
        for input in &sig.inputs {
            let FnArg::Typed(pat_type) = input else {
                continue;
            };
            let ty = pat_type.ty.as_ref();
            reject_borrowed(ty)?;
            arg_types.push(ty.clone());
        }

        let output = match &sig.output {
            ReturnType::Default => quote! { () },
            ReturnType::Type(_, ty) => {
                if let Type::ImplTrait(_) = ty.as_ref() {
                    return Err(syn::Error::new_spanned(
                        ty,
                        "surface operations cannot return `impl Trait`",
                    ));
                }
                quote! { #ty }
            }
        };

        let shape = arg_types
            .iter()
            .map(|ty| normalize_type_name(&quote!(#ty).to_string()))
            .collect();

        Ok(Self {
            ident: sig.ident.clone(),
            arg_types,
            output,
            shape,
        })
    }
}

/// Arguments are moved into type-erased slots, so they must be `'static`
fn reject_borrowed(ty: &Type) -> syn::Result<()> {
    match ty {
        Type::Reference(_) => Err(syn::Error::new_spanned(
            ty,
            "surface operations take owned arguments; borrowed parameters cannot be intercepted",
        )),
        Type::ImplTrait(_) => Err(syn::Error::new_spanned(
            ty,
            "surface operations cannot take `impl Trait` parameters",
        )),
        Type::Paren(inner) => reject_borrowed(&inner.elem),
        Type::Group(inner) => reject_borrowed(&inner.elem),
        _ => Ok(()),
    }
}

/// Drop token spacing except where two identifier characters meet
/// (`Vec < String >` becomes `Vec<String>`, `dyn Fn ()` becomes `dyn Fn()`)
fn normalize_type_name(raw: &str) -> String {
    let chars: Vec<char> = raw.trim().chars().collect();
    let mut out = String::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        if c.is_whitespace() {
            let prev = out.chars().last();
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            let ident_char = |c: char| c.is_alphanumeric() || c == '_';
            if let (Some(p), Some(&n)) = (prev, next) {
                if ident_char(p) && ident_char(n) && !out.ends_with(' ') {
                    out.push(' ');
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

fn has_bound(item: &ItemTrait, name: &str) -> bool {
    item.supertraits.iter().any(|bound| match bound {
        TypeParamBound::Trait(t) => t.path.segments.last().is_some_and(|s| s.ident == name),
        _ => false,
    })
}

/// Expand a `#[surface]` trait
pub fn expand(attrs: &SurfaceAttrs, mut item: ItemTrait) -> syn::Result<TokenStream> {
    if !item.generics.params.is_empty() || item.generics.where_clause.is_some() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            "surfaces cannot be generic",
        ));
    }
    if let Some(unsafety) = &item.unsafety {
        return Err(syn::Error::new_spanned(unsafety, "surfaces cannot be unsafe traits"));
    }
    if let Some(auto_token) = &item.auto_token {
        return Err(syn::Error::new_spanned(auto_token, "surfaces cannot be auto traits"));
    }

    // The generated proxy only implements the surface itself
    for bound in &item.supertraits {
        if let TypeParamBound::Trait(t) = bound {
            let auto = t
                .path
                .segments
                .last()
                .is_some_and(|s| s.ident == "Send" || s.ident == "Sync");
            if !auto {
                return Err(syn::Error::new_spanned(
                    t,
                    "surfaces cannot have supertraits other than `Send` and `Sync`",
                ));
            }
        }
    }

    let mut operations = Vec::new();
    for trait_item in &item.items {
        match trait_item {
            TraitItem::Fn(method) => operations.push(OperationInfo::from_signature(&method.sig)?),
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "surfaces may only declare methods",
                ));
            }
        }
    }

    // Proxies are shared across threads behind `Arc<dyn Trait>`
    if !has_bound(&item, "Send") {
        item.supertraits.push(syn::parse_quote!(::core::marker::Send));
    }
    if !has_bound(&item, "Sync") {
        item.supertraits.push(syn::parse_quote!(::core::marker::Sync));
    }
    if item.colon_token.is_none() {
        item.colon_token = Some(Default::default());
    }

    let krate = attrs.crate_path();
    let trait_ident = &item.ident;
    let surface_name = attrs
        .name
        .clone()
        .unwrap_or_else(|| trait_ident.to_string());

    let descriptors = operations.iter().map(|op| {
        let name = op.ident.to_string();
        let shape = &op.shape;
        quote! {
            #krate::OperationDescriptor::new(#name, &[#(#shape),*])
        }
    });

    let methods = operations
        .iter()
        .enumerate()
        .map(|(ordinal, op)| proxy_method(&krate, trait_ident, ordinal, op));

    Ok(quote! {
        #item

        const _: () = {
            struct Proxy {
                target: ::std::sync::Arc<dyn #trait_ident>,
                dispatch: #krate::Dispatch,
            }

            impl #trait_ident for Proxy {
                #(#methods)*
            }

            impl #krate::Surface for dyn #trait_ident {
                const NAME: &'static str = #surface_name;
                const OPERATIONS: &'static [#krate::OperationDescriptor] = &[#(#descriptors),*];

                fn intercept_with(
                    target: ::std::sync::Arc<Self>,
                    dispatch: #krate::Dispatch,
                ) -> ::std::sync::Arc<Self> {
                    ::std::sync::Arc::new(Proxy { target, dispatch })
                }
            }
        };
    })
}

fn proxy_method(
    krate: &TokenStream,
    trait_ident: &Ident,
    ordinal: usize,
    op: &OperationInfo,
) -> TokenStream {
    let ident = &op.ident;
    let output = &op.output;
    let arg_types = &op.arg_types;
    let arg_idents: Vec<Ident> = (0..arg_types.len())
        .map(|i| format_ident!("arg{}", i))
        .collect();
    let indices: Vec<usize> = (0..arg_types.len()).collect();
    let arity = arg_types.len();
    let (mutability, closure_arg) = if arity == 0 {
        (quote! {}, quote! { _ })
    } else {
        (quote! { mut }, quote! { mut arguments })
    };

    quote! {
        fn #ident(&self, #(#arg_idents: #arg_types),*) -> #output {
            if !self.dispatch.intercepts(#ordinal) {
                return <dyn #trait_ident as #trait_ident>::#ident(&*self.target, #(#arg_idents),*);
            }
            let #mutability arguments = #krate::Arguments::with_capacity(#arity);
            #(arguments.push(#arg_idents);)*
            let target = &self.target;
            self.dispatch.invoke(#ordinal, target, arguments, |#closure_arg: #krate::Arguments| {
                #(let #arg_idents = arguments.take::<#arg_types>(#indices);)*
                #krate::Outcome::new(<dyn #trait_ident as #trait_ident>::#ident(&**target, #(#arg_idents),*))
            })
        }
    }
}
