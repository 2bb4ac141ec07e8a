use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

#[proc_macro_derive(Bundle)]
pub fn derive_bundle_fn(input: TokenStream) -> TokenStream {
    let main_crate = quote!(::component_store);

    let DeriveInput {
        ident,
        data,
        generics,
        ..
    } = parse_macro_input!(input as DeriveInput);

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = if let syn::Data::Struct(data) = data {
        data.fields
    } else {
        return syn::Error::new(ident.span(), "Bundle can only be derived for structs")
            .to_compile_error()
            .into();
    };

    let members: Vec<proc_macro2::TokenStream> = fields
        .iter()
        .enumerate()
        .map(|(i, field)| match &field.ident {
            Some(field_ident) => quote!(#field_ident),
            None => {
                let i = syn::Index::from(i);
                quote!(#i)
            }
        })
        .collect();

    quote! {
        impl #impl_generics #main_crate::Bundle for #ident #ty_generics #where_clause {
            fn bind_to<__Alloc: #main_crate::HandleAllocator>(
                self,
                store: &mut #main_crate::ComponentStore<__Alloc>,
                entity: #main_crate::Entity,
            ) -> usize {
                0 #(+ store.bind(entity, self.#members).1 as usize)*
            }

            fn assign_to<__Alloc: #main_crate::HandleAllocator>(
                self,
                store: &mut #main_crate::ComponentStore<__Alloc>,
                entity: #main_crate::Entity,
            ) {
                #(store.bind_or_assign(entity, self.#members);)*
            }

            fn bind_to_unchecked<__Alloc: #main_crate::HandleAllocator>(
                self,
                store: &mut #main_crate::ComponentStore<__Alloc>,
                entity: #main_crate::Entity,
            ) {
                #(store.bind_unchecked(entity, self.#members);)*
            }
        }
    }
    .into()
}
